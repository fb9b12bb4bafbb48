//! Lending protocol orchestration.
//!
//! Deployment runs in dependency order, one batch per layer:
//!
//! 1. environment: mock assets, mock price oracle, mock summary stats
//! 2. mock prices and protocol: oracle adapter and pool factory, which need
//!    the pragma addresses from step 1
//! 3. approvals of the factory on every asset
//!
//! Pools are created one `create_pool` call at a time; the pool address comes
//! from the factory's `CreatePool` event.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info, warn};

use deployer_cache::DeploymentRecord;
use deployer_config::{
    patch_with_env, CompiledConfig, CompiledPool, ConfigError, PragmaOracleParams,
    ProtocolAddresses,
};
use deployer_resolver::CreationEvent;
use deployer_types::{Address, Calldata, Felt, TransactionHash, TransactionResult, U256};

use crate::deferred::{Batch, Deferred, DeferredCall};
use crate::deployer::Deployer;
use crate::error::DeployError;
use crate::handle::ContractHandle;

pub const MOCK_ASSET: &str = "MockAsset";
pub const MOCK_PRAGMA_ORACLE: &str = "MockPragmaOracle";
pub const MOCK_PRAGMA_SUMMARY: &str = "MockPragmaSummary";
pub const ORACLE: &str = "Oracle";
pub const POOL: &str = "Pool";
pub const POOL_FACTORY: &str = "PoolFactory";
pub const V_TOKEN: &str = "VToken";

/// Event emitted by the factory for every created pool.
pub const CREATE_POOL_EVENT: &str = "CreatePool";

/// Allowance granted to the factory on every asset, in base units.
///
/// Pool creation pulls a small inflation-protection deposit of each asset.
pub const DEFAULT_APPROVAL: u128 = 2000;

#[derive(Debug, Clone)]
pub struct PragmaContracts {
    pub oracle: ContractHandle,
    pub summary_stats: ContractHandle,
}

/// Mock contracts of a test environment.
#[derive(Debug, Clone)]
pub struct Environment {
    pub assets: Vec<ContractHandle>,
    pub pragma: PragmaContracts,
}

#[derive(Debug, Clone)]
pub struct ProtocolContracts {
    pub pool_factory: ContractHandle,
    pub oracle: ContractHandle,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CreatePoolOptions {
    /// Replace token addresses with the environment's mock assets.
    pub devnet_env: bool,
}

#[derive(Debug, Clone)]
pub struct CreatedPool {
    pub handle: ContractHandle,
    /// Parameters the pool was created with, after any patching.
    pub params: CompiledPool,
    /// `None` when the pool already existed.
    pub transaction: Option<TransactionHash>,
}

impl CreatedPool {
    pub fn existed(&self) -> bool {
        self.transaction.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct UpgradeSummary {
    pub class_hashes: BTreeMap<String, Felt>,
    pub factory_transaction: TransactionHash,
    pub pool_transaction: Option<TransactionHash>,
    pub pools: Vec<String>,
}

/// Builds the environment and protocol layers for one compiled config.
pub struct ProtocolDeployer {
    deployer: Arc<Deployer>,
    config: CompiledConfig,
}

impl ProtocolDeployer {
    pub fn new(deployer: Arc<Deployer>, config: CompiledConfig) -> Self {
        Self { deployer, config }
    }

    pub fn deployer(&self) -> &Arc<Deployer> {
        &self.deployer
    }

    pub fn config(&self) -> &CompiledConfig {
        &self.config
    }

    /// Owner of the protocol contracts: the signing account.
    pub fn owner(&self) -> Address {
        self.deployer.account()
    }

    fn missing_env(&self) -> DeployError {
        ConfigError::MissingField {
            pool: self.config.network.clone(),
            field: "env".to_string(),
        }
        .into()
    }

    /// Mock tokens minted to `recipient`.
    ///
    /// The first asset is deferred alone so its class is declared exactly
    /// once before the rest are deferred concurrently.
    pub async fn defer_mock_assets(
        &self,
        recipient: Address,
    ) -> Result<Deferred<Vec<ContractHandle>>, DeployError> {
        let (first, rest) = self
            .config
            .env
            .split_first()
            .ok_or_else(|| self.missing_env())?;
        let first = self
            .deployer
            .defer_contract(MOCK_ASSET, first.constructor_calldata(recipient))
            .await?;
        let rest = try_join_all(rest.iter().map(|params| {
            self.deployer
                .defer_contract(MOCK_ASSET, params.constructor_calldata(recipient))
        }))
        .await?;

        let mut parts = Vec::with_capacity(rest.len() + 1);
        parts.push(first);
        parts.extend(rest);
        Ok(Deferred::collect(parts))
    }

    pub async fn defer_pragma(&self) -> Result<Deferred<PragmaContracts>, DeployError> {
        let oracle = self
            .deployer
            .defer_contract(MOCK_PRAGMA_ORACLE, Vec::new())
            .await?;
        let summary = self
            .deployer
            .defer_contract(MOCK_PRAGMA_SUMMARY, Vec::new())
            .await?;
        Ok(oracle.and(summary).map(|(oracle, summary_stats)| PragmaContracts {
            oracle,
            summary_stats,
        }))
    }

    pub async fn defer_env(&self) -> Result<Deferred<Environment>, DeployError> {
        let assets = self.defer_mock_assets(self.deployer.account()).await?;
        let pragma = self.defer_pragma().await?;
        Ok(assets
            .and(pragma)
            .map(|(assets, pragma)| Environment { assets, pragma }))
    }

    pub async fn deploy_env(&self) -> Result<(Environment, TransactionResult), DeployError> {
        let mut batch = Batch::new();
        let env = batch.push(self.defer_env().await?);
        let result = self.deployer.execute(batch).await?;
        Ok((env, result))
    }

    /// `set_price(pragma_key, price)` on the mock oracle for every env asset.
    pub fn price_calls(&self, pragma: &PragmaContracts) -> Vec<DeferredCall> {
        self.config
            .env
            .iter()
            .map(|asset| {
                DeferredCall::new(
                    &pragma.oracle,
                    "set_price",
                    Calldata::new()
                        .arg(asset.pragma_key.to_felt())
                        .arg(asset.price)
                        .build(),
                )
            })
            .collect()
    }

    pub async fn set_env_prices(
        &self,
        pragma: &PragmaContracts,
    ) -> Result<TransactionResult, DeployError> {
        self.deployer.execute_calls(self.price_calls(pragma)).await
    }

    /// Oracle adapter over `pragma` and the pool factory.
    pub async fn defer_protocol(
        &self,
        pragma: &PragmaContracts,
    ) -> Result<Deferred<ProtocolContracts>, DeployError> {
        let owner = self.owner();
        let oracle = self
            .deployer
            .defer_contract(
                ORACLE,
                Calldata::new()
                    .arg(owner)
                    .arg(owner)
                    .arg(pragma.oracle.address()?)
                    .arg(pragma.summary_stats.address()?)
                    .build(),
            )
            .await?;

        let (pool_class, v_token_class, oracle_class) = futures::try_join!(
            self.deployer.declare_cached(POOL),
            self.deployer.declare_cached(V_TOKEN),
            self.deployer.declare_cached(ORACLE),
        )?;
        let factory = self
            .deployer
            .defer_contract(
                POOL_FACTORY,
                Calldata::new()
                    .arg(owner)
                    .arg(pool_class)
                    .arg(v_token_class)
                    .arg(oracle_class)
                    .build(),
            )
            .await?;

        Ok(factory
            .and(oracle)
            .map(|(pool_factory, oracle)| ProtocolContracts {
                pool_factory,
                oracle,
            }))
    }

    pub async fn deploy_protocol(
        &self,
        pragma: PragmaContracts,
    ) -> Result<Protocol, DeployError> {
        let mut batch = Batch::new();
        let contracts = batch.push(self.defer_protocol(&pragma).await?);
        self.deployer.execute(batch).await?;
        Ok(Protocol::new(
            Arc::clone(&self.deployer),
            contracts,
            pragma,
            Vec::new(),
        ))
    }

    /// Environment, prices and protocol, then factory approvals.
    pub async fn deploy_env_and_protocol(&self) -> Result<Protocol, DeployError> {
        let (env, _) = self.deploy_env().await?;

        let mut batch = Batch::new();
        batch.extend_calls(self.price_calls(&env.pragma));
        let contracts = batch.push(self.defer_protocol(&env.pragma).await?);
        self.deployer.execute(batch).await?;

        let protocol = Protocol::new(
            Arc::clone(&self.deployer),
            contracts,
            env.pragma,
            env.assets,
        );
        protocol
            .set_approvals(&protocol.pool_factory, &protocol.assets, DEFAULT_APPROVAL)
            .await?;
        info!(
            pool_factory = %protocol.pool_factory,
            oracle = %protocol.oracle,
            assets = protocol.assets.len(),
            "deployed environment and protocol"
        );
        Ok(protocol)
    }

    /// Price feed contracts recorded by an earlier run or named in the config.
    pub fn load_pragma(
        &self,
        record: &DeploymentRecord,
        addresses: &ProtocolAddresses,
    ) -> Result<PragmaContracts, DeployError> {
        let oracle = recorded_or_configured(
            record.pragma.oracle,
            addresses.pragma.oracle.as_deref(),
            "pragma.oracle",
        )?;
        let summary_stats = recorded_or_configured(
            record.pragma.summary_stats,
            addresses.pragma.summary_stats.as_deref(),
            "pragma.summary_stats",
        )?;
        Ok(PragmaContracts {
            oracle: self.deployer.load_contract(MOCK_PRAGMA_ORACLE, oracle),
            summary_stats: self.deployer.load_contract(MOCK_PRAGMA_SUMMARY, summary_stats),
        })
    }

    /// Handles for a protocol deployed by an earlier run.
    ///
    /// Addresses in `record` take precedence over `addresses` from the config.
    pub fn load_protocol(
        &self,
        record: &DeploymentRecord,
        addresses: &ProtocolAddresses,
    ) -> Result<Protocol, DeployError> {
        let pool_factory = recorded_or_configured(
            record.pool_factory,
            addresses.pool_factory.as_deref(),
            "pool_factory",
        )?;
        let oracle =
            recorded_or_configured(record.oracle, addresses.oracle.as_deref(), "oracle")?;
        let pragma = self.load_pragma(record, addresses)?;

        let assets = if record.assets.is_empty() {
            let mut seen = Vec::new();
            for pool in self.config.pools.values() {
                for asset in pool.assets() {
                    if !asset.felt().is_zero() && !seen.contains(&asset) {
                        seen.push(asset);
                    }
                }
            }
            seen
        } else {
            record.assets.clone()
        };

        let load = |label: &str, address: Address| self.deployer.load_contract(label, address);
        let mut protocol = Protocol::new(
            Arc::clone(&self.deployer),
            ProtocolContracts {
                pool_factory: load(POOL_FACTORY, pool_factory),
                oracle: load(ORACLE, oracle),
            },
            pragma,
            assets
                .into_iter()
                .enumerate()
                .map(|(index, address)| load(&format!("asset{}", index), address))
                .collect(),
        );

        for (name, value) in &addresses.pools {
            let field = format!("pools.{}", name);
            let address = recorded_or_configured(None, Some(value.as_str()), &field)?;
            protocol.pools.insert(name.clone(), load(POOL, address));
        }
        for (name, address) in &record.pools {
            protocol.pools.insert(name.clone(), load(POOL, *address));
        }
        debug!(
            pools = protocol.pools.len(),
            assets = protocol.assets.len(),
            "loaded protocol"
        );
        Ok(protocol)
    }
}

fn recorded_or_configured(
    recorded: Option<Address>,
    configured: Option<&str>,
    field: &str,
) -> Result<Address, DeployError> {
    if let Some(address) = recorded {
        return Ok(address);
    }
    let value = configured.ok_or_else(|| ConfigError::MissingField {
        pool: "protocol".to_string(),
        field: field.to_string(),
    })?;
    Address::parse(value, field).map_err(|_| {
        ConfigError::InvalidAddress {
            pool: "protocol".to_string(),
            field: field.to_string(),
            value: value.to_string(),
        }
        .into()
    })
}

/// Resolved protocol contracts plus the pools created so far.
#[derive(Clone)]
pub struct Protocol {
    deployer: Arc<Deployer>,
    pub pool_factory: ContractHandle,
    pub oracle: ContractHandle,
    pub pragma: PragmaContracts,
    pub assets: Vec<ContractHandle>,
    /// Pool key -> pool.
    pub pools: BTreeMap<String, ContractHandle>,
}

impl std::fmt::Debug for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protocol")
            .field("pool_factory", &self.pool_factory)
            .field("oracle", &self.oracle)
            .field("pragma", &self.pragma)
            .field("assets", &self.assets)
            .field("pools", &self.pools)
            .finish_non_exhaustive()
    }
}

impl Protocol {
    pub fn new(
        deployer: Arc<Deployer>,
        contracts: ProtocolContracts,
        pragma: PragmaContracts,
        assets: Vec<ContractHandle>,
    ) -> Self {
        Self {
            deployer,
            pool_factory: contracts.pool_factory,
            oracle: contracts.oracle,
            pragma,
            assets,
            pools: BTreeMap::new(),
        }
    }

    pub fn deployer(&self) -> &Arc<Deployer> {
        &self.deployer
    }

    pub fn asset_addresses(&self) -> Result<Vec<Address>, DeployError> {
        self.assets
            .iter()
            .map(|asset| asset.address().map_err(DeployError::from))
            .collect()
    }

    /// One batch of `approve(spender, amount)`, one call per asset.
    pub async fn set_approvals(
        &self,
        spender: &ContractHandle,
        assets: &[ContractHandle],
        amount: u128,
    ) -> Result<Option<TransactionResult>, DeployError> {
        if assets.is_empty() {
            debug!("no assets to approve");
            return Ok(None);
        }
        let spender = spender.address()?;
        let calls = assets
            .iter()
            .map(|asset| {
                DeferredCall::new(
                    asset,
                    "approve",
                    Calldata::new().arg(spender).arg(U256::from(amount)).build(),
                )
            })
            .collect();
        let result = self.deployer.execute_calls(calls).await?;
        info!(spender = %spender, assets = assets.len(), "approved");
        Ok(Some(result))
    }

    /// Register every asset's price feed with the oracle adapter in one batch.
    pub async fn add_assets_to_oracle(
        &self,
        params: &[PragmaOracleParams],
    ) -> Result<Option<TransactionResult>, DeployError> {
        if params.is_empty() {
            return Ok(None);
        }
        let calls = params
            .iter()
            .map(|param| {
                let mut calldata = vec![param.asset.felt()];
                calldata.extend(param.config_calldata());
                DeferredCall::new(&self.oracle, "add_asset", calldata)
            })
            .collect();
        let result = self.deployer.execute_calls(calls).await?;
        info!(assets = params.len(), "added assets to oracle");
        Ok(Some(result))
    }

    /// Create `pool` through the factory unless a pool of that key exists.
    pub async fn create_pool(
        &mut self,
        pool: &CompiledPool,
        options: CreatePoolOptions,
    ) -> Result<CreatedPool, DeployError> {
        let params = if options.devnet_env {
            patch_with_env(pool, &self.asset_addresses()?, self.deployer.account())?
        } else {
            pool.clone()
        };

        if let Some(existing) = self.pools.get(&pool.key) {
            warn!(pool = %pool.key, address = %existing, "pool already exists; skipping create_pool");
            return Ok(CreatedPool {
                handle: existing.clone(),
                params,
                transaction: None,
            });
        }

        let handle = ContractHandle::pending(
            format!("{} pool", pool.key),
            CreationEvent::new(CREATE_POOL_EVENT, "pool"),
        );
        let call = DeferredCall::new(
            &self.pool_factory,
            "create_pool",
            params.create_pool_calldata(self.oracle.address()?),
        );
        let mut batch = Batch::new();
        batch.push(Deferred {
            value: (),
            calls: vec![call],
            handles: vec![handle.clone()],
        });
        let result = self.deployer.execute(batch).await?;
        info!(pool = %pool.key, address = %handle, "created pool");

        self.pools.insert(pool.key.clone(), handle.clone());
        Ok(CreatedPool {
            handle,
            params,
            transaction: Some(result.hash),
        })
    }

    /// Apply the shutdown periods and per-pair shutdown LTVs of `params`.
    pub async fn configure_shutdown(
        &self,
        pool: &ContractHandle,
        params: &CompiledPool,
    ) -> Result<TransactionResult, DeployError> {
        let shutdown = &params.shutdown_params;
        let mut calls = vec![DeferredCall::new(
            pool,
            "set_shutdown_config",
            Calldata::new()
                .arg(shutdown.recovery_period)
                .arg(shutdown.subscription_period)
                .build(),
        )];
        for ltv in &shutdown.ltv_params {
            let collateral = params.asset_params[ltv.collateral_asset_index as usize].asset;
            let debt = params.asset_params[ltv.debt_asset_index as usize].asset;
            calls.push(DeferredCall::new(
                pool,
                "set_shutdown_ltv_config",
                Calldata::new()
                    .arg(collateral)
                    .arg(debt)
                    .arg(ltv.max_ltv)
                    .build(),
            ));
        }
        self.deployer.execute_calls(calls).await
    }

    /// Declare new classes, upgrade the factory and point it at them, then
    /// upgrade every known pool.
    pub async fn upgrade(&self) -> Result<UpgradeSummary, DeployError> {
        let (factory_class, pool_class, v_token_class, oracle_class) = futures::try_join!(
            self.deployer.declare_cached(POOL_FACTORY),
            self.deployer.declare_cached(POOL),
            self.deployer.declare_cached(V_TOKEN),
            self.deployer.declare_cached(ORACLE),
        )?;
        let no_upgrade_data: Option<Vec<Felt>> = None;

        let factory_calls = vec![
            DeferredCall::new(
                &self.pool_factory,
                "upgrade",
                Calldata::new()
                    .arg(factory_class)
                    .arg(no_upgrade_data.clone())
                    .build(),
            ),
            DeferredCall::new(&self.pool_factory, "set_pool_class_hash", vec![pool_class]),
            DeferredCall::new(
                &self.pool_factory,
                "set_v_token_class_hash",
                vec![v_token_class],
            ),
            DeferredCall::new(&self.pool_factory, "set_oracle_class_hash", vec![oracle_class]),
        ];
        let factory_result = self.deployer.execute_calls(factory_calls).await?;
        info!(pool_factory = %self.pool_factory, "upgraded pool factory");

        let pool_calls: Vec<DeferredCall> = self
            .pools
            .values()
            .map(|pool| {
                DeferredCall::new(
                    pool,
                    "upgrade",
                    Calldata::new()
                        .arg(pool_class)
                        .arg(no_upgrade_data.clone())
                        .build(),
                )
            })
            .collect();
        let pool_transaction = if pool_calls.is_empty() {
            None
        } else {
            let result = self.deployer.execute_calls(pool_calls).await?;
            info!(pools = self.pools.len(), "upgraded pools");
            Some(result.hash)
        };

        let class_hashes = BTreeMap::from([
            (POOL_FACTORY.to_string(), factory_class),
            (POOL.to_string(), pool_class),
            (V_TOKEN.to_string(), v_token_class),
            (ORACLE.to_string(), oracle_class),
        ]);
        Ok(UpgradeSummary {
            class_hashes,
            factory_transaction: factory_result.hash,
            pool_transaction,
            pools: self.pools.keys().cloned().collect(),
        })
    }

    /// Copy every resolved address and declared class hash into `record`.
    ///
    /// Fields this protocol does not know, such as assets of a protocol
    /// deployed without an environment, keep their recorded value.
    pub fn write_record(&self, record: &mut DeploymentRecord) {
        let resolved = [
            (&mut record.pool_factory, &self.pool_factory),
            (&mut record.oracle, &self.oracle),
            (&mut record.pragma.oracle, &self.pragma.oracle),
            (&mut record.pragma.summary_stats, &self.pragma.summary_stats),
        ];
        for (slot, handle) in resolved {
            if let Some(address) = handle.try_address() {
                *slot = Some(address);
            }
        }
        let assets: Vec<Address> = self
            .assets
            .iter()
            .filter_map(ContractHandle::try_address)
            .collect();
        if !assets.is_empty() {
            record.assets = assets;
        }
        for (name, pool) in &self.pools {
            if let Some(address) = pool.try_address() {
                record.pools.insert(name.clone(), address);
            }
        }
        record.merge_class_hashes(self.deployer.cache().class_hashes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deployer_cache::{ArtifactStore, DeclarationCache};
    use deployer_config::{compile, DeploymentConfig};
    use deployer_transport::MemoryLedger;

    const ACCOUNT: u64 = 0xacc;

    fn config() -> DeploymentConfig {
        serde_json::from_value(serde_json::json!({
            "name": "devnet",
            "env": [
                {"name": "Ether", "symbol": "ETH", "decimals": 18,
                 "initial_supply": 1000, "pragma_key": "ETH/USD", "price": 2500},
                {"name": "USD Coin", "symbol": "USDC", "decimals": 6,
                 "initial_supply": 1000000, "pragma_key": "USDC/USD", "price": 1},
                {"name": "Wrapped BTC", "symbol": "WBTC", "decimals": 8,
                 "initial_supply": 10, "pragma_key": "WBTC/USD", "price": 60000}
            ],
            "pools": {
                "genesis": {
                    "asset_parameters": [
                        asset("ETH", "ETH/USD"),
                        asset("USDC", "USDC/USD")
                    ],
                    "pair_parameters": [
                        {"collateral_asset_name": "ETH", "debt_asset_name": "USDC",
                         "max_ltv": 0.8, "liquidation_factor": 0.9, "shutdown_ltv": 0.85}
                    ],
                    "pool_parameters": {
                        "pool_name": "Genesis", "owner": "0x1", "fee_recipient": "0x2",
                        "recovery_period": 86400, "subscription_period": 43200
                    }
                }
            }
        }))
        .unwrap()
    }

    fn asset(name: &str, key: &str) -> serde_json::Value {
        serde_json::json!({
            "asset_name": name,
            "token": {"symbol": name, "decimals": 18},
            "floor": 0.0001, "initial_full_utilization_rate": 0.0001,
            "max_utilization": 0.95, "fee_rate": 0.02,
            "min_target_utilization": 0.75, "max_target_utilization": 0.85,
            "target_utilization": 0.8, "min_full_utilization_rate": 0.0001,
            "max_full_utilization_rate": 0.01, "zero_utilization_rate": 0.00001,
            "rate_half_life": 172800, "target_rate_percent": 0.2,
            "pragma": {"pragma_key": key, "timeout": 3600, "number_of_sources": 2}
        })
    }

    fn setup() -> (Arc<MemoryLedger>, ProtocolDeployer) {
        let ledger = Arc::new(MemoryLedger::new(Address::new(Felt::from(ACCOUNT))));
        let deployer = Deployer::new(
            ledger.clone(),
            Arc::new(DeclarationCache::new()),
            ArtifactStore::new("missing-artifacts", "lending").with_placeholders(),
        );
        let compiled = compile(&config()).unwrap();
        (ledger, ProtocolDeployer::new(Arc::new(deployer), compiled))
    }

    #[tokio::test]
    async fn test_env_batch_resolves_every_handle() {
        let (ledger, builder) = setup();
        let (env, result) = builder.deploy_env().await.unwrap();

        assert_eq!(env.assets.len(), 3);
        assert!(env.assets.iter().all(ContractHandle::is_resolved));
        assert!(env.pragma.oracle.is_resolved());
        assert_eq!(result.events.len(), 5);
        assert_eq!(ledger.submissions(), 1);
        // MockAsset declared once for three deployments
        assert_eq!(ledger.declare_calls(), 3);
    }

    #[tokio::test]
    async fn test_env_prices_follow_the_env_batch() {
        let (ledger, builder) = setup();
        let (env, _) = builder.deploy_env().await.unwrap();
        builder.set_env_prices(&env.pragma).await.unwrap();

        let oracle = ledger.instance(env.pragma.oracle.address().unwrap()).unwrap();
        assert_eq!(
            ledger.class_name(oracle.class_hash).as_deref(),
            Some(MOCK_PRAGMA_ORACLE)
        );
        let prices: Vec<&Vec<Felt>> = oracle
            .invocations
            .iter()
            .filter(|(name, _)| name == "set_price")
            .map(|(_, calldata)| calldata)
            .collect();
        assert_eq!(prices.len(), 3);
        assert_eq!(prices[0][1], Felt::from(2500 * deployer_types::SCALE));
        assert_eq!(ledger.submissions(), 2);
    }

    #[tokio::test]
    async fn test_protocol_needs_resolved_pragma() {
        let (_ledger, builder) = setup();
        let pragma = builder.defer_pragma().await.unwrap().value;
        let err = builder.defer_protocol(&pragma).await.unwrap_err();
        assert!(matches!(err, DeployError::Resolution(_)));
    }

    #[tokio::test]
    async fn test_full_flow_creates_pool_once() {
        let (ledger, builder) = setup();
        let mut protocol = builder.deploy_env_and_protocol().await.unwrap();
        assert!(protocol.pool_factory.is_resolved());
        assert!(protocol.oracle.is_resolved());
        // env, prices+protocol, approvals
        assert_eq!(ledger.submissions(), 3);

        let pool = builder.config().pool("genesis").unwrap().clone();
        let options = CreatePoolOptions { devnet_env: true };
        protocol
            .add_assets_to_oracle(
                &patch_with_env(&pool, &protocol.asset_addresses().unwrap(), builder.owner())
                    .unwrap()
                    .pragma_oracle_params,
            )
            .await
            .unwrap();
        let created = protocol.create_pool(&pool, options).await.unwrap();
        assert!(!created.existed());
        assert!(created.handle.is_resolved());
        assert_eq!(
            created.params.asset_params[0].asset,
            protocol.assets[0].address().unwrap()
        );
        protocol
            .configure_shutdown(&created.handle, &created.params)
            .await
            .unwrap();

        let again = protocol.create_pool(&pool, options).await.unwrap();
        assert!(again.existed());
        assert!(again.handle.same_as(&created.handle));

        let mut record = DeploymentRecord::new("devnet");
        protocol.write_record(&mut record);
        assert_eq!(record.pools.len(), 1);
        assert_eq!(record.assets.len(), 3);
        assert!(record.class_hashes.contains_key(POOL_FACTORY));
    }

    #[tokio::test]
    async fn test_upgrade_batches_factory_then_pools() {
        let (ledger, builder) = setup();
        let mut protocol = builder.deploy_env_and_protocol().await.unwrap();
        let pool = builder.config().pool("genesis").unwrap().clone();
        protocol
            .create_pool(&pool, CreatePoolOptions { devnet_env: true })
            .await
            .unwrap();
        let before = ledger.submissions();

        let summary = protocol.upgrade().await.unwrap();
        assert_eq!(ledger.submissions(), before + 2);
        assert!(summary.pool_transaction.is_some());
        assert_eq!(summary.pools, vec!["genesis".to_string()]);

        let factory = ledger
            .instance(protocol.pool_factory.address().unwrap())
            .unwrap();
        let entrypoints: Vec<&str> = factory
            .invocations
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert!(entrypoints.ends_with(&[
            "upgrade",
            "set_pool_class_hash",
            "set_v_token_class_hash",
            "set_oracle_class_hash"
        ]));
    }

    #[tokio::test]
    async fn test_load_protocol_prefers_record() {
        let (_ledger, builder) = setup();
        let mut record = DeploymentRecord::new("devnet");
        record.pool_factory = Some(Address::new(Felt::from(0x10u64)));
        record.pools.insert("genesis".into(), Address::new(Felt::from(0x20u64)));
        let addresses: ProtocolAddresses = serde_json::from_value(serde_json::json!({
            "pool_factory": "0x99",
            "oracle": "0x11",
            "pragma": {"oracle": "0x12", "summary_stats": "0x13"}
        }))
        .unwrap();

        let protocol = builder.load_protocol(&record, &addresses).unwrap();
        assert_eq!(
            protocol.pool_factory.address().unwrap(),
            Address::new(Felt::from(0x10u64))
        );
        assert_eq!(
            protocol.oracle.address().unwrap(),
            Address::new(Felt::from(0x11u64))
        );
        assert!(protocol.pools.contains_key("genesis"));

        let err = builder
            .load_protocol(&DeploymentRecord::new("devnet"), &ProtocolAddresses::default())
            .unwrap_err();
        assert!(err.to_string().contains("pool_factory"));
    }
}
