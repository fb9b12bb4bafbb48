//! Event-derived address resolution.
//!
//! Contracts created inside a batch have no address until the batch is
//! finalized. The address is read back from the event the creating call
//! emitted:
//!
//! - universal deployer instantiations emit `ContractDeployed { address, salt, .. }`;
//!   several deployments in one batch are told apart by their unique salt
//! - factory calls such as `create_pool` emit their own event (`CreatePool { pool }`)
//!
//! This crate provides:
//! - [`CreationEvent`]: which event yields an address and which field holds it
//! - [`resolve_address`]: scan one finalized result for one creation event
//! - [`resolve_all`]: resolve every creation event of a batch, in order

pub mod event;

pub use event::{resolve_address, resolve_all, CreationEvent, ResolutionError};
