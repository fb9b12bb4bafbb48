//! One deployment run: config, record and ledger wired together.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info};

use deployer_cache::{ArtifactStore, DeclarationCache, DeploymentRecord, FsRecordStore};
use deployer_config::{check_network, compile, load_config, CompiledConfig, DeploymentConfig};
use deployer_core::{Deployer, DeployError, Protocol, ProtocolDeployer};
use deployer_transport::network::resolve_network;
use deployer_transport::{LedgerClient, MemoryLedger, RpcLedgerClient};
use deployer_types::env_utils::env_string;
use deployer_types::{Address, Felt, PollConfig};

/// Signer used by simulated runs when no account is given.
pub const SIMULATED_ACCOUNT: Address = Address::new(Felt::from_hex_const("0x5151"));

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub config: PathBuf,
    pub record: PathBuf,
    /// Explicit network; inferred from `rpc_url` when absent.
    pub network: Option<String>,
    pub rpc_url: String,
    pub account: Option<String>,
    pub artifacts: PathBuf,
    pub package: String,
    /// Run against an in-process ledger instead of `rpc_url`.
    pub simulate: bool,
}

pub struct Session {
    pub network: String,
    pub config: DeploymentConfig,
    pub compiled: CompiledConfig,
    pub store: FsRecordStore,
    pub record: DeploymentRecord,
    pub deployer: Arc<Deployer>,
    /// Set for simulated runs.
    pub ledger: Option<Arc<MemoryLedger>>,
}

impl Session {
    /// Load and compile the config, check the network and open the ledger.
    ///
    /// Nothing is sent to the ledger here.
    pub fn open(options: &SessionOptions) -> Result<Self> {
        let config = load_config(&options.config)?;
        let network = resolve_network(
            options.network.as_deref().or(Some(config.name.as_str())),
            &options.rpc_url,
        );
        check_network(&network, env_string("NETWORK").as_deref())?;
        if config.name != network {
            return Err(anyhow!(
                "config {} is for network '{}', not '{}'",
                options.config.display(),
                config.name,
                network
            ));
        }
        let compiled = compile(&config)?;

        let store = FsRecordStore::new(&options.record);
        let record = store.load_or_new(&network)?;

        let account = options
            .account
            .as_deref()
            .map(|value| Address::parse(value, "account"))
            .transpose()?;

        let artifacts = ArtifactStore::new(&options.artifacts, &options.package);
        let (client, artifacts, ledger) = if options.simulate {
            let ledger = Arc::new(MemoryLedger::new(account.unwrap_or(SIMULATED_ACCOUNT)));
            register_known_contracts(&ledger, &config, &compiled, &record)?;
            info!(network = %network, "simulating against an in-process ledger");
            let client: Arc<dyn LedgerClient> = ledger.clone();
            (client, artifacts.with_placeholders(), Some(ledger))
        } else {
            let account = account
                .context("--account (or ADDRESS) is required unless --simulate is set")?;
            let client = RpcLedgerClient::new(&options.rpc_url, account, PollConfig::from_env());
            info!(network = %network, rpc_url = %client.endpoint(), "connected");
            let client: Arc<dyn LedgerClient> = Arc::new(client);
            (client, artifacts, None)
        };

        let deployer = Deployer::new(client, Arc::new(DeclarationCache::new()), artifacts);
        Ok(Self {
            network,
            config,
            compiled,
            store,
            record,
            deployer: Arc::new(deployer),
            ledger,
        })
    }

    pub fn protocol_deployer(&self) -> ProtocolDeployer {
        ProtocolDeployer::new(Arc::clone(&self.deployer), self.compiled.clone())
    }

    /// Protocol from the record, falling back to config addresses.
    pub fn load_protocol(&self) -> Result<Protocol, DeployError> {
        self.protocol_deployer()
            .load_protocol(&self.record, &self.config.protocol)
    }

    /// Whether pools use the environment's mock assets.
    pub fn is_devnet_env(&self) -> bool {
        !self.compiled.env.is_empty()
    }

    /// Merge `protocol` into the record and write it.
    pub fn save(&mut self, protocol: &Protocol) -> Result<()> {
        protocol.write_record(&mut self.record);
        self.store.save(&mut self.record)
    }
}

/// Make addresses from earlier runs callable on a fresh simulated ledger.
fn register_known_contracts(
    ledger: &MemoryLedger,
    config: &DeploymentConfig,
    compiled: &CompiledConfig,
    record: &DeploymentRecord,
) -> Result<()> {
    let mut known: Vec<Address> = Vec::new();
    known.extend(record.pool_factory);
    known.extend(record.oracle);
    known.extend(record.pragma.oracle);
    known.extend(record.pragma.summary_stats);
    known.extend(record.assets.iter().copied());
    known.extend(record.pools.values().copied());

    let protocol = &config.protocol;
    let configured = [
        &protocol.pool_factory,
        &protocol.oracle,
        &protocol.pragma.oracle,
        &protocol.pragma.summary_stats,
    ];
    for value in configured.into_iter().flatten() {
        known.push(Address::parse(value, "protocol")?);
    }
    for value in protocol.pools.values() {
        known.push(Address::parse(value, "protocol.pools")?);
    }
    for pool in compiled.pools.values() {
        known.extend(pool.assets());
    }

    known.retain(|address| !address.felt().is_zero());
    known.sort();
    known.dedup();
    for address in &known {
        ledger.register_contract(*address, Felt::ZERO);
    }
    debug!(contracts = known.len(), "registered known contracts");
    Ok(())
}
