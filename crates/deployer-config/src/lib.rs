//! Deployment configuration.
//!
//! A config document names assets and pairs the way people write them
//! (`"ETH"`, `0.75`, `172800`). Contracts take positional structs with asset
//! indices and fixed-point integers. This crate converts one into the other.
//!
//! - [`schema`]: the authored JSON document
//! - [`params`]: compiled parameter structs and their calldata layout
//! - [`compiler`]: [`compile`] and [`compile_pool`]
//! - [`error`]: [`ConfigError`]
//!
//! Compilation is pure: no I/O and no ledger access. Only [`load_config`]
//! touches the filesystem.

pub mod compiler;
pub mod error;
pub mod params;
pub mod schema;

pub use compiler::{compile, compile_env, compile_pool, patch_with_env, CompiledConfig};
pub use error::ConfigError;
pub use params::{
    AggregationMode, AssetParams, CompiledPool, FeeParams, InterestRateConfig, LtvParams,
    MockAssetParams, PairParams, PragmaOracleParams, ShutdownParams, VTokenParams,
};
pub use schema::{DeploymentConfig, EnvAssetEntry, PoolEntry, ProtocolAddresses};

use std::path::Path;

/// Read and parse a config document.
pub fn load_config(path: &Path) -> Result<DeploymentConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// `--network` must agree with `NETWORK` when the variable is set.
pub fn check_network(argument: &str, env_network: Option<&str>) -> Result<(), ConfigError> {
    match env_network {
        Some(env) if env != argument => Err(ConfigError::NetworkMismatch {
            argument: argument.to_string(),
            env: env.to_string(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_network() {
        assert!(check_network("mainnet", None).is_ok());
        assert!(check_network("mainnet", Some("mainnet")).is_ok());
        let err = check_network("mainnet", Some("sepolia")).unwrap_err();
        assert!(err.to_string().contains("sepolia"));
    }

    #[test]
    fn test_load_config_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.json"));

        let missing = load_config(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }
}
