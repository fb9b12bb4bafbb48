//! Ledger transport layer.
//!
//! The deployment engine consumes the ledger through a small capability set,
//! expressed as the [`LedgerClient`] trait:
//!
//! - `declare(code) -> class hash`
//! - `submit(calls) -> transaction hash`
//! - `wait_for_finality(hash) -> TransactionResult`
//! - `read_state(address, method, args) -> values`
//!
//! This crate provides:
//! - [`rpc`]: JSON-RPC client for a signing account gateway
//! - [`memory`]: in-process ledger with atomic batch semantics, used by `--simulate` and tests
//! - [`network`]: endpoint defaults and network inference
//! - [`test_utils`]: fixture builders for finalized transactions
//!
//! # Example
//!
//! ```ignore
//! use deployer_transport::{LedgerClient, MemoryLedger};
//!
//! let ledger = MemoryLedger::new(account);
//! let class_hash = ledger.declare(&code).await?;
//! let hash = ledger.submit(&calls).await?;
//! let result = ledger.wait_for_finality(hash).await?;
//! ```

pub mod memory;
pub mod network;
pub mod rpc;
pub mod test_utils;

pub use memory::MemoryLedger;
pub use rpc::RpcLedgerClient;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use deployer_types::{Address, Call, CompiledCode, Felt, TransactionHash, TransactionResult};

/// Universal deployer contract: instantiates declared classes and emits
/// `ContractDeployed` with the new address.
pub const UNIVERSAL_DEPLOYER: Address = Address::new(Felt::from_hex_const(
    "0x041a78e741e5af2fec34b695679bc6891742439f7afb8484ecd7766661ad02bf",
));

/// Entrypoint on the universal deployer.
pub const DEPLOY_CONTRACT_ENTRYPOINT: &str = "deploy_contract";

/// Event emitted by the universal deployer for every instantiation.
pub const CONTRACT_DEPLOYED_EVENT: &str = "ContractDeployed";

/// Capability set the deployment engine needs from a ledger.
///
/// Implementations own connection setup, signing and transport retries.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Account that signs every submitted transaction.
    fn account(&self) -> Address;

    /// Upload compiled code and return its class hash.
    async fn declare(&self, code: &CompiledCode) -> Result<Felt>;

    /// Submit all calls as one atomic transaction and return its hash.
    async fn submit(&self, calls: &[Call]) -> Result<TransactionHash>;

    /// Block until the ledger reports the transaction accepted, reverted or rejected.
    ///
    /// Fails with [`FinalityTimeout`] when the transport gives up waiting.
    async fn wait_for_finality(&self, hash: TransactionHash) -> Result<TransactionResult>;

    /// Read-only call against deployed state.
    async fn read_state(&self, address: Address, method: &str, args: &[Felt]) -> Result<Vec<Felt>>;
}

#[async_trait]
impl<T: LedgerClient + ?Sized> LedgerClient for Arc<T> {
    fn account(&self) -> Address {
        (**self).account()
    }

    async fn declare(&self, code: &CompiledCode) -> Result<Felt> {
        (**self).declare(code).await
    }

    async fn submit(&self, calls: &[Call]) -> Result<TransactionHash> {
        (**self).submit(calls).await
    }

    async fn wait_for_finality(&self, hash: TransactionHash) -> Result<TransactionResult> {
        (**self).wait_for_finality(hash).await
    }

    async fn read_state(&self, address: Address, method: &str, args: &[Felt]) -> Result<Vec<Felt>> {
        (**self).read_state(address, method, args).await
    }
}

/// Waiting for finality exceeded the transport's bound.
///
/// The transaction may still finalize later; the operator has to check it by hand.
#[derive(Debug, Clone, thiserror::Error)]
#[error("transaction {hash} not finalized after {waited:?}")]
pub struct FinalityTimeout {
    pub hash: TransactionHash,
    pub waited: Duration,
}
