//! Shared types for the pool-deployer workspace.
//!
//! This crate provides the value types every other crate speaks:
//!
//! - [`felt`]: field elements and contract addresses
//! - [`encoding`]: the [`CalldataEncode`] trait and composite calldata types
//! - [`fixed_point`]: decimal to fixed-point conversion (`SCALE`, `UTILIZATION_SCALE`)
//! - [`transaction`]: calls, emitted events, finalized transactions, compiled code
//! - [`env_utils`]: environment variable helpers

pub mod encoding;
pub mod env_utils;
pub mod felt;
pub mod fixed_point;
pub mod transaction;

pub use encoding::{ByteArray, Calldata, CalldataEncode, ShortString, I257, U256};
pub use felt::{Address, Felt};
pub use fixed_point::{to_scale, to_utilization_scale, FixedPointError, SCALE, UTILIZATION_SCALE};
pub use transaction::{
    Call, CompiledCode, EmittedEvent, TransactionHash, TransactionResult, TransactionStatus,
};

use std::time::Duration;

use env_utils::env_var_or;

/// How long and how often to poll the ledger for transaction finality.
#[derive(Debug, Copy, Clone)]
pub struct PollConfig {
    /// Delay between status checks.
    pub interval: Duration,
    /// Give up waiting after this long; the transaction may still finalize later.
    pub timeout: Duration,
}

impl PollConfig {
    pub fn new(interval_ms: u64, timeout_secs: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Read `DEPLOYER_POLL_INTERVAL_MS` and `DEPLOYER_FINALITY_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self::new(
            env_var_or(
                "DEPLOYER_POLL_INTERVAL_MS",
                default.interval.as_millis() as u64,
            ),
            env_var_or("DEPLOYER_FINALITY_TIMEOUT_SECS", default.timeout.as_secs()),
        )
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2_000),
            timeout: Duration::from_secs(300),
        }
    }
}
