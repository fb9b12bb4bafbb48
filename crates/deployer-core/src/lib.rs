//! Deferred deployment and batch execution.
//!
//! Contracts that do not exist yet are represented by pending
//! [`ContractHandle`]s. Builders return [`Deferred`] values that pair those
//! handles with the calls creating them; [`Deployer::execute`] submits a
//! [`Batch`] atomically, waits for finality and resolves every handle from
//! the emitted creation events.
//!
//! # Example
//!
//! ```ignore
//! use deployer_core::{Batch, Deployer};
//!
//! let deployer = Deployer::new(client, cache, artifacts);
//! let mut batch = Batch::new();
//! let token = batch.push(deployer.defer_contract("MockAsset", calldata).await?);
//! deployer.execute(batch).await?;
//! println!("token at {}", token.address()?);
//! ```
//!
//! [`protocol`] builds the lending protocol on top of this; [`verify`] reads a
//! created pool back and compares it with its compiled parameters.

pub mod deferred;
pub mod deployer;
pub mod error;
pub mod handle;
pub mod protocol;
pub mod verify;

pub use deferred::{Batch, CallTarget, Deferred, DeferredCall};
pub use deployer::Deployer;
pub use error::DeployError;
pub use handle::ContractHandle;
pub use protocol::{
    CreatePoolOptions, CreatedPool, Environment, PragmaContracts, Protocol, ProtocolContracts,
    ProtocolDeployer, UpgradeSummary, DEFAULT_APPROVAL,
};
pub use verify::{verify_pool, VerificationMismatch, VerificationReport};
