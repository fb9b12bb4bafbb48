//! Pool deployer
//!
//! Deploys a lending protocol and its pools from a declarative config:
//!
//! - **Config compilation**: named, human-scale parameters to positional fixed-point structs
//! - **Declaration caching**: every contract class is uploaded at most once per run
//! - **Deferred deployment**: contracts are promised as pending handles and batched
//! - **Batch execution**: one atomic transaction per batch, addresses read from events
//! - **Deployment record**: resolved addresses persisted so later runs load instead of redeploy
//!
//! See [`session`] for wiring a run together and [`deployer_core`] for the engine.

#![allow(clippy::result_large_err)]

pub mod session;

pub use deployer_cache as cache;
pub use deployer_config as config;
pub use deployer_core as core;
pub use deployer_resolver as resolver;
pub use deployer_transport as transport;
pub use deployer_types as types;

pub use session::{Session, SessionOptions};
