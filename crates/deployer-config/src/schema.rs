//! The authored config document.
//!
//! ```json
//! {
//!   "name": "devnet",
//!   "protocol": { "pool_factory": null, "oracle": null,
//!                 "pragma": { "oracle": null, "summary_stats": null } },
//!   "env": [ { "name": "Ether", "symbol": "ETH", "decimals": 18,
//!              "initial_supply": 1000000, "pragma_key": "ETH/USD", "price": 2500 } ],
//!   "pools": {
//!     "genesis": {
//!       "asset_parameters": [ ... ],
//!       "pair_parameters": [ ... ],
//!       "pool_parameters": { "pool_name": "Genesis", "owner": "0x1", ... }
//!     }
//!   }
//! }
//! ```
//!
//! Ratios are human-scale decimals, periods are seconds. Older documents used
//! `poolFactory`/`singleton` for the factory and `extensionPO` for the oracle;
//! those keys are still read but never written.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Network this document targets.
    pub name: String,
    #[serde(default)]
    pub protocol: ProtocolAddresses,
    /// Mock assets deployed by `deploy-environment`; absent on live networks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<EnvAssetEntry>>,
    #[serde(default)]
    pub pools: BTreeMap<String, PoolEntry>,
}

/// Addresses of contracts that already exist on the target network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolAddresses {
    #[serde(default, alias = "poolFactory", alias = "singleton")]
    pub pool_factory: Option<String>,
    #[serde(default, alias = "extensionPO")]
    pub oracle: Option<String>,
    #[serde(default)]
    pub pragma: PragmaEntry,
    /// Pool name -> address of pools created outside this tool.
    #[serde(default)]
    pub pools: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PragmaEntry {
    #[serde(default)]
    pub oracle: Option<String>,
    #[serde(default)]
    pub summary_stats: Option<String>,
}

/// A mock token for test environments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvAssetEntry {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Whole tokens minted to the recipient.
    #[serde(default)]
    pub initial_supply: f64,
    pub pragma_key: String,
    /// Mock oracle price in quote units.
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub is_legacy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolEntry {
    pub asset_parameters: Vec<AssetEntry>,
    #[serde(default)]
    pub pair_parameters: Vec<PairEntry>,
    pub pool_parameters: PoolParametersEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenEntry {
    /// Deployed token; omitted for environments whose tokens are deployed by this tool.
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub decimals: Option<u8>,
    #[serde(default)]
    pub is_legacy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub asset_name: String,
    pub token: TokenEntry,
    pub floor: f64,
    #[serde(default = "default_rate_accumulator")]
    pub initial_rate_accumulator: f64,
    pub initial_full_utilization_rate: f64,
    pub max_utilization: f64,
    #[serde(default)]
    pub fee_rate: f64,
    pub min_target_utilization: f64,
    pub max_target_utilization: f64,
    pub target_utilization: f64,
    pub min_full_utilization_rate: f64,
    pub max_full_utilization_rate: f64,
    pub zero_utilization_rate: f64,
    /// Seconds.
    pub rate_half_life: u64,
    pub target_rate_percent: f64,
    pub pragma: PragmaAssetEntry,
    #[serde(default)]
    pub v_token_name: Option<String>,
    #[serde(default)]
    pub v_token_symbol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PragmaAssetEntry {
    pub pragma_key: String,
    /// Seconds.
    #[serde(default)]
    pub timeout: u64,
    #[serde(default)]
    pub number_of_sources: u32,
    /// Seconds.
    #[serde(default)]
    pub start_time_offset: u64,
    /// Seconds.
    #[serde(default)]
    pub time_window: u64,
    #[serde(default = "default_aggregation_mode")]
    pub aggregation_mode: String,
}

/// A collateral/debt pair. Assets are referenced by `asset_name` or by token address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairEntry {
    pub collateral_asset_name: String,
    pub debt_asset_name: String,
    pub max_ltv: f64,
    #[serde(alias = "liquidation_discount")]
    pub liquidation_factor: f64,
    #[serde(default)]
    pub debt_cap: f64,
    /// Max LTV applied while the pool is in recovery.
    #[serde(default)]
    pub shutdown_ltv: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolParametersEntry {
    pub pool_name: String,
    pub owner: String,
    /// Defaults to `owner`.
    #[serde(default)]
    pub curator: Option<String>,
    pub fee_recipient: String,
    /// Seconds.
    pub recovery_period: u64,
    /// Seconds.
    pub subscription_period: u64,
}

fn default_rate_accumulator() -> f64 {
    1.0
}

fn default_aggregation_mode() -> String {
    "median".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_protocol_keys() {
        let protocol: ProtocolAddresses = serde_json::from_str(
            r#"{"singleton": "0x1", "extensionPO": "0x2", "pragma": {"oracle": "0x3"}}"#,
        )
        .unwrap();
        assert_eq!(protocol.pool_factory.as_deref(), Some("0x1"));
        assert_eq!(protocol.oracle.as_deref(), Some("0x2"));
        assert_eq!(protocol.pragma.summary_stats, None);

        let written = serde_json::to_string(&protocol).unwrap();
        assert!(written.contains("pool_factory"));
        assert!(!written.contains("singleton"));
    }

    #[test]
    fn test_optional_defaults() {
        let pragma: PragmaAssetEntry =
            serde_json::from_str(r#"{"pragma_key": "ETH/USD"}"#).unwrap();
        assert_eq!(pragma.aggregation_mode, "median");
        assert_eq!(pragma.timeout, 0);

        let pair: PairEntry = serde_json::from_str(
            r#"{"collateral_asset_name": "ETH", "debt_asset_name": "USDC",
                "max_ltv": 0.8, "liquidation_discount": 0.9}"#,
        )
        .unwrap();
        assert_eq!(pair.liquidation_factor, 0.9);
        assert_eq!(pair.debt_cap, 0.0);
        assert_eq!(pair.shutdown_ltv, None);
    }
}
