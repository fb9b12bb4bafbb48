//! Configuration errors.
//!
//! All of these are raised before any ledger call is made.

use deployer_types::FixedPointError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: String, message: String },

    #[error("pool '{pool}': asset '{name}' is listed more than once")]
    DuplicateAsset { pool: String, name: String },

    #[error("pool '{pool}': {field} references unknown asset '{name}'")]
    UnknownAsset {
        pool: String,
        field: String,
        name: String,
    },

    #[error("pool '{pool}': missing required field '{field}'")]
    MissingField { pool: String, field: String },

    #[error("pool '{pool}': invalid value for '{field}': {source}")]
    InvalidNumber {
        pool: String,
        field: String,
        #[source]
        source: FixedPointError,
    },

    #[error("pool '{pool}': invalid address for '{field}': '{value}'")]
    InvalidAddress {
        pool: String,
        field: String,
        value: String,
    },

    #[error("pool '{pool}': '{field}' must be ASCII of at most 31 bytes, got '{value}'")]
    InvalidShortString {
        pool: String,
        field: String,
        value: String,
    },

    #[error("unknown pool '{0}'")]
    UnknownPool(String),

    #[error("config defines no pools")]
    NoPools,

    #[error("pool '{pool}' has {expected} assets but the environment deployed {actual}")]
    EnvironmentMismatch {
        pool: String,
        expected: usize,
        actual: usize,
    },

    #[error("--network '{argument}' does not match NETWORK='{env}'")]
    NetworkMismatch { argument: String, env: String },
}
