//! Config compiler.
//!
//! Two passes per pool:
//! 1. list the assets in document order; an asset's index is its position
//! 2. resolve every pair's collateral and debt reference to an index
//!
//! References match an `asset_name` exactly. A reference that names no asset
//! but parses as an address matches the asset with that token address.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use deployer_types::encoding::normalize_address;
use deployer_types::fixed_point::{scale_f64, to_scale, to_utilization_scale};
use deployer_types::{Address, FixedPointError, ShortString};

use crate::error::ConfigError;
use crate::params::{
    AggregationMode, AssetParams, CompiledPool, FeeParams, InterestRateConfig, LtvParams,
    MockAssetParams, PairParams, PragmaOracleParams, ShutdownParams, VTokenParams,
};
use crate::schema::{AssetEntry, DeploymentConfig, EnvAssetEntry, PairEntry, PoolEntry};

/// Every pool of a document, plus its mock environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledConfig {
    pub network: String,
    pub env: Vec<MockAssetParams>,
    pub pools: BTreeMap<String, CompiledPool>,
}

impl CompiledConfig {
    pub fn pool(&self, key: &str) -> Result<&CompiledPool, ConfigError> {
        self.pools
            .get(key)
            .ok_or_else(|| ConfigError::UnknownPool(key.to_string()))
    }
}

pub fn compile(config: &DeploymentConfig) -> Result<CompiledConfig, ConfigError> {
    let env = compile_env(config)?;
    let pools = config
        .pools
        .iter()
        .map(|(key, entry)| Ok((key.clone(), compile_pool(key, entry)?)))
        .collect::<Result<BTreeMap<_, _>, ConfigError>>()?;
    debug!(network = %config.name, pools = pools.len(), env = env.len(), "compiled config");
    Ok(CompiledConfig {
        network: config.name.clone(),
        env,
        pools,
    })
}

/// Mock token parameters; empty when the document has no environment.
pub fn compile_env(config: &DeploymentConfig) -> Result<Vec<MockAssetParams>, ConfigError> {
    config
        .env
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(compile_env_asset)
        .collect()
}

fn compile_env_asset(entry: &EnvAssetEntry) -> Result<MockAssetParams, ConfigError> {
    let ctx = Ctx::new("env");
    Ok(MockAssetParams {
        name: entry.name.clone(),
        symbol: entry.symbol.clone(),
        decimals: entry.decimals,
        initial_supply: ctx.number(
            &format!("{}.initial_supply", entry.symbol),
            scale_f64(entry.initial_supply, u32::from(entry.decimals)),
        )?,
        pragma_key: ctx.short_string(&format!("{}.pragma_key", entry.symbol), &entry.pragma_key)?,
        price: ctx.number(&format!("{}.price", entry.symbol), to_scale(entry.price))?,
        is_legacy: entry.is_legacy,
    })
}

/// Compile one pool entry.
pub fn compile_pool(key: &str, entry: &PoolEntry) -> Result<CompiledPool, ConfigError> {
    let ctx = Ctx::new(key);
    let params = &entry.pool_parameters;

    // pass 1: asset list
    let mut index_by_name: HashMap<&str, u32> = HashMap::new();
    let mut addresses = Vec::with_capacity(entry.asset_parameters.len());
    for (index, asset) in entry.asset_parameters.iter().enumerate() {
        if index_by_name
            .insert(asset.asset_name.as_str(), index as u32)
            .is_some()
        {
            return Err(ConfigError::DuplicateAsset {
                pool: key.to_string(),
                name: asset.asset_name.clone(),
            });
        }
        let address = match &asset.token.address {
            Some(value) => ctx.address(&format!("{}.token.address", asset.asset_name), value)?,
            None => Address::ZERO,
        };
        addresses.push(address);
    }

    let mut asset_params = Vec::new();
    let mut v_token_params = Vec::new();
    let mut interest_rate_configs = Vec::new();
    let mut pragma_oracle_params = Vec::new();
    for (asset, address) in entry.asset_parameters.iter().zip(&addresses) {
        asset_params.push(ctx.asset_params(asset, *address)?);
        v_token_params.push(v_token_params_for(&params.pool_name, asset, *address));
        interest_rate_configs.push(ctx.interest_rate_config(asset)?);
        pragma_oracle_params.push(ctx.oracle_params(asset, *address)?);
    }

    // pass 2: pair references
    let resolve = |field: &str, reference: &str| -> Result<u32, ConfigError> {
        if let Some(index) = index_by_name.get(reference) {
            return Ok(*index);
        }
        let wanted = normalize_address(reference);
        let by_address = reference.starts_with("0x")
            && Address::parse(reference, field).is_ok();
        if by_address {
            if let Some(index) = addresses
                .iter()
                .position(|a| !a.felt().is_zero() && a.to_hex_full() == wanted)
            {
                return Ok(index as u32);
            }
        }
        Err(ConfigError::UnknownAsset {
            pool: key.to_string(),
            field: field.to_string(),
            name: reference.to_string(),
        })
    };

    let mut pair_params = Vec::new();
    let mut ltv_params = Vec::new();
    for pair in &entry.pair_parameters {
        let collateral = resolve("collateral_asset_name", &pair.collateral_asset_name)?;
        let debt = resolve("debt_asset_name", &pair.debt_asset_name)?;
        let (pair_param, shutdown_ltv) = ctx.pair_params(pair, collateral, debt)?;
        pair_params.push(pair_param);
        ltv_params.push(shutdown_ltv);
    }

    let owner = ctx.address("pool_parameters.owner", &params.owner)?;
    let curator = match &params.curator {
        Some(value) => ctx.address("pool_parameters.curator", value)?,
        None => owner,
    };

    Ok(CompiledPool {
        key: key.to_string(),
        name: ctx.short_string("pool_parameters.pool_name", &params.pool_name)?,
        owner,
        curator,
        fee_params: FeeParams {
            fee_recipient: ctx.address("pool_parameters.fee_recipient", &params.fee_recipient)?,
        },
        asset_params,
        v_token_params,
        interest_rate_configs,
        pragma_oracle_params,
        pair_params,
        shutdown_params: ShutdownParams {
            recovery_period: params.recovery_period,
            subscription_period: params.subscription_period,
            ltv_params,
        },
    })
}

/// Replace token addresses with freshly deployed environment assets, by position,
/// and hand ownership to `owner`.
pub fn patch_with_env(
    pool: &CompiledPool,
    env_assets: &[Address],
    owner: Address,
) -> Result<CompiledPool, ConfigError> {
    if env_assets.len() < pool.asset_params.len() {
        return Err(ConfigError::EnvironmentMismatch {
            pool: pool.key.clone(),
            expected: pool.asset_params.len(),
            actual: env_assets.len(),
        });
    }
    let mut patched = pool.clone();
    for (index, asset) in env_assets.iter().take(pool.asset_params.len()).enumerate() {
        patched.asset_params[index].asset = *asset;
        patched.v_token_params[index].debt_asset = *asset;
        patched.pragma_oracle_params[index].asset = *asset;
    }
    if patched.curator == patched.owner {
        patched.curator = owner;
    }
    patched.owner = owner;
    Ok(patched)
}

fn v_token_params_for(pool_name: &str, asset: &AssetEntry, address: Address) -> VTokenParams {
    let symbol = asset
        .token
        .symbol
        .clone()
        .unwrap_or_else(|| asset.asset_name.clone());
    VTokenParams {
        v_token_name: asset
            .v_token_name
            .clone()
            .unwrap_or_else(|| format!("{} {}", pool_name, symbol)),
        v_token_symbol: asset
            .v_token_symbol
            .clone()
            .unwrap_or_else(|| format!("v{}", symbol)),
        debt_asset: address,
    }
}

/// Error context for one pool.
struct Ctx<'a> {
    pool: &'a str,
}

impl<'a> Ctx<'a> {
    fn new(pool: &'a str) -> Self {
        Self { pool }
    }

    fn number(
        &self,
        field: &str,
        value: Result<u128, FixedPointError>,
    ) -> Result<u128, ConfigError> {
        value.map_err(|source| ConfigError::InvalidNumber {
            pool: self.pool.to_string(),
            field: field.to_string(),
            source,
        })
    }

    fn scale(&self, asset: &str, field: &str, value: f64) -> Result<u128, ConfigError> {
        self.number(&format!("{}.{}", asset, field), to_scale(value))
    }

    fn utilization(&self, asset: &str, field: &str, value: f64) -> Result<u128, ConfigError> {
        self.number(&format!("{}.{}", asset, field), to_utilization_scale(value))
    }

    fn address(&self, field: &str, value: &str) -> Result<Address, ConfigError> {
        Address::parse(value, field).map_err(|_| ConfigError::InvalidAddress {
            pool: self.pool.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        })
    }

    fn short_string(&self, field: &str, value: &str) -> Result<ShortString, ConfigError> {
        ShortString::new(value).map_err(|_| ConfigError::InvalidShortString {
            pool: self.pool.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        })
    }

    fn asset_params(&self, asset: &AssetEntry, address: Address) -> Result<AssetParams, ConfigError> {
        let name = asset.asset_name.as_str();
        Ok(AssetParams {
            asset: address,
            floor: self.scale(name, "floor", asset.floor)?,
            initial_rate_accumulator: self.scale(
                name,
                "initial_rate_accumulator",
                asset.initial_rate_accumulator,
            )?,
            initial_full_utilization_rate: self.scale(
                name,
                "initial_full_utilization_rate",
                asset.initial_full_utilization_rate,
            )?,
            max_utilization: self.scale(name, "max_utilization", asset.max_utilization)?,
            is_legacy: asset.token.is_legacy,
            fee_rate: self.scale(name, "fee_rate", asset.fee_rate)?,
        })
    }

    fn interest_rate_config(&self, asset: &AssetEntry) -> Result<InterestRateConfig, ConfigError> {
        let name = asset.asset_name.as_str();
        Ok(InterestRateConfig {
            min_target_utilization: self.utilization(
                name,
                "min_target_utilization",
                asset.min_target_utilization,
            )?,
            max_target_utilization: self.utilization(
                name,
                "max_target_utilization",
                asset.max_target_utilization,
            )?,
            target_utilization: self.utilization(
                name,
                "target_utilization",
                asset.target_utilization,
            )?,
            min_full_utilization_rate: self.scale(
                name,
                "min_full_utilization_rate",
                asset.min_full_utilization_rate,
            )?,
            max_full_utilization_rate: self.scale(
                name,
                "max_full_utilization_rate",
                asset.max_full_utilization_rate,
            )?,
            zero_utilization_rate: self.scale(
                name,
                "zero_utilization_rate",
                asset.zero_utilization_rate,
            )?,
            rate_half_life: asset.rate_half_life,
            target_rate_percent: self.scale(name, "target_rate_percent", asset.target_rate_percent)?,
        })
    }

    fn oracle_params(
        &self,
        asset: &AssetEntry,
        address: Address,
    ) -> Result<PragmaOracleParams, ConfigError> {
        let name = asset.asset_name.as_str();
        let pragma = &asset.pragma;
        let aggregation_mode = AggregationMode::parse(&pragma.aggregation_mode).ok_or_else(|| {
            ConfigError::MissingField {
                pool: self.pool.to_string(),
                field: format!("{}.pragma.aggregation_mode (median|mean)", name),
            }
        })?;
        Ok(PragmaOracleParams {
            asset: address,
            pragma_key: self.short_string(&format!("{}.pragma.pragma_key", name), &pragma.pragma_key)?,
            timeout: pragma.timeout,
            number_of_sources: pragma.number_of_sources,
            start_time_offset: pragma.start_time_offset,
            time_window: pragma.time_window,
            aggregation_mode,
        })
    }

    fn pair_params(
        &self,
        pair: &PairEntry,
        collateral: u32,
        debt: u32,
    ) -> Result<(PairParams, LtvParams), ConfigError> {
        let label = format!("{}/{}", pair.collateral_asset_name, pair.debt_asset_name);
        let max_ltv = self.scale(&label, "max_ltv", pair.max_ltv)?;
        let shutdown_ltv = match pair.shutdown_ltv {
            Some(value) => self.scale(&label, "shutdown_ltv", value)?,
            None => max_ltv,
        };
        Ok((
            PairParams {
                collateral_asset_index: collateral,
                debt_asset_index: debt,
                max_ltv,
                liquidation_factor: self.scale(&label, "liquidation_factor", pair.liquidation_factor)?,
                debt_cap: self.scale(&label, "debt_cap", pair.debt_cap)?,
            },
            LtvParams {
                collateral_asset_index: collateral,
                debt_asset_index: debt,
                max_ltv: shutdown_ltv,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PoolParametersEntry, PragmaAssetEntry, TokenEntry};
    use deployer_types::{Felt, SCALE};

    fn asset(name: &str, address: Option<&str>) -> AssetEntry {
        AssetEntry {
            asset_name: name.to_string(),
            token: TokenEntry {
                address: address.map(String::from),
                symbol: Some(name.to_string()),
                decimals: Some(18),
                is_legacy: false,
            },
            floor: 0.0001,
            initial_rate_accumulator: 1.0,
            initial_full_utilization_rate: 0.3,
            max_utilization: 0.9,
            fee_rate: 0.02,
            min_target_utilization: 0.75,
            max_target_utilization: 0.85,
            target_utilization: 0.8,
            min_full_utilization_rate: 0.1,
            max_full_utilization_rate: 3.0,
            zero_utilization_rate: 0.001,
            rate_half_life: 172_800,
            target_rate_percent: 0.2,
            pragma: PragmaAssetEntry {
                pragma_key: format!("{}/USD", name),
                timeout: 3600,
                number_of_sources: 2,
                start_time_offset: 0,
                time_window: 0,
                aggregation_mode: "median".to_string(),
            },
            v_token_name: None,
            v_token_symbol: None,
        }
    }

    fn pair(collateral: &str, debt: &str) -> PairEntry {
        PairEntry {
            collateral_asset_name: collateral.to_string(),
            debt_asset_name: debt.to_string(),
            max_ltv: 0.75,
            liquidation_factor: 0.9,
            debt_cap: 0.0,
            shutdown_ltv: Some(0.8),
        }
    }

    fn pool(assets: Vec<AssetEntry>, pairs: Vec<PairEntry>) -> PoolEntry {
        PoolEntry {
            asset_parameters: assets,
            pair_parameters: pairs,
            pool_parameters: PoolParametersEntry {
                pool_name: "Genesis".to_string(),
                owner: "0x1".to_string(),
                curator: None,
                fee_recipient: "0x2".to_string(),
                recovery_period: 2_592_000,
                subscription_period: 172_800,
            },
        }
    }

    #[test]
    fn test_fee_rate_and_scales() {
        let compiled = compile_pool("genesis", &pool(vec![asset("ETH", None)], vec![])).unwrap();
        let params = &compiled.asset_params[0];
        assert_eq!(params.fee_rate, 20_000_000_000_000_000);
        assert_eq!(params.initial_rate_accumulator, SCALE);
        assert_eq!(compiled.interest_rate_configs[0].target_utilization, 80_000);
        assert_eq!(compiled.interest_rate_configs[0].rate_half_life, 172_800);
        assert_eq!(compiled.curator, compiled.owner);
        assert_eq!(compiled.v_token_params[0].v_token_name, "Genesis ETH");
        assert_eq!(compiled.v_token_params[0].v_token_symbol, "vETH");
    }

    #[test]
    fn test_pair_indices_follow_asset_order() {
        let entry = pool(
            vec![asset("ETH", None), asset("USDC", None), asset("WBTC", None)],
            vec![pair("WBTC", "USDC"), pair("ETH", "WBTC")],
        );
        let compiled = compile_pool("genesis", &entry).unwrap();
        assert_eq!(compiled.pair_params[0].collateral_asset_index, 2);
        assert_eq!(compiled.pair_params[0].debt_asset_index, 1);
        assert_eq!(compiled.pair_params[1].collateral_asset_index, 0);
        assert_eq!(compiled.pair_params[0].max_ltv, 750_000_000_000_000_000);
        assert_eq!(
            compiled.shutdown_params.ltv_params[1].max_ltv,
            800_000_000_000_000_000
        );
    }

    #[test]
    fn test_unknown_asset_names_the_reference() {
        let entry = pool(vec![asset("ETH", None)], vec![pair("ETH", "USDC")]);
        let err = compile_pool("genesis", &entry).unwrap_err();
        match &err {
            ConfigError::UnknownAsset { field, name, .. } => {
                assert_eq!(field, "debt_asset_name");
                assert_eq!(name, "USDC");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("USDC"));
    }

    #[test]
    fn test_duplicate_asset_rejected() {
        let entry = pool(vec![asset("ETH", None), asset("ETH", None)], vec![]);
        assert!(matches!(
            compile_pool("genesis", &entry),
            Err(ConfigError::DuplicateAsset { .. })
        ));
    }

    #[test]
    fn test_pairs_may_reference_token_addresses() {
        let entry = pool(
            vec![asset("ETH", Some("0xabc")), asset("USDC", Some("0xdef"))],
            vec![pair("0x0DEF", "ETH")],
        );
        let compiled = compile_pool("genesis", &entry).unwrap();
        assert_eq!(compiled.pair_params[0].collateral_asset_index, 1);
        assert_eq!(compiled.pair_params[0].debt_asset_index, 0);
    }

    #[test]
    fn test_negative_ratio_is_a_config_error() {
        let mut bad = asset("ETH", None);
        bad.max_utilization = -0.5;
        let err = compile_pool("genesis", &pool(vec![bad], vec![])).unwrap_err();
        assert!(err.to_string().contains("ETH.max_utilization"));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let mut config = DeploymentConfig {
            name: "devnet".to_string(),
            protocol: Default::default(),
            env: None,
            pools: BTreeMap::new(),
        };
        config.pools.insert(
            "b".to_string(),
            pool(vec![asset("ETH", None), asset("USDC", None)], vec![pair("ETH", "USDC")]),
        );
        config
            .pools
            .insert("a".to_string(), pool(vec![asset("ETH", None)], vec![]));

        let first = serde_json::to_vec(&compile(&config).unwrap()).unwrap();
        let second = serde_json::to_vec(&compile(&config).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_patch_with_env_replaces_assets_by_position() {
        let compiled = compile_pool(
            "genesis",
            &pool(vec![asset("ETH", None), asset("USDC", None)], vec![]),
        )
        .unwrap();
        let env = [Address::new(Felt::from(0x10u64)), Address::new(Felt::from(0x20u64))];
        let owner = Address::new(Felt::from(0x99u64));

        let patched = patch_with_env(&compiled, &env, owner).unwrap();
        assert_eq!(patched.assets(), env.to_vec());
        assert_eq!(patched.pragma_oracle_params[1].asset, env[1]);
        assert_eq!(patched.owner, owner);
        assert_eq!(patched.curator, owner);

        assert!(matches!(
            patch_with_env(&compiled, &env[..1], owner),
            Err(ConfigError::EnvironmentMismatch { .. })
        ));
    }

    #[test]
    fn test_env_assets_scale_by_decimals() {
        let config = DeploymentConfig {
            name: "devnet".to_string(),
            protocol: Default::default(),
            env: Some(vec![EnvAssetEntry {
                name: "USD Coin".to_string(),
                symbol: "USDC".to_string(),
                decimals: 6,
                initial_supply: 1000.5,
                pragma_key: "USDC/USD".to_string(),
                price: 1.0,
                is_legacy: false,
            }]),
            pools: BTreeMap::new(),
        };
        let env = compile_env(&config).unwrap();
        assert_eq!(env[0].initial_supply, 1_000_500_000);
        assert_eq!(env[0].price, SCALE);
    }
}
