//! Pool commands - create configured pools and verify them against the config

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::info;

use deployer_config::{patch_with_env, CompiledPool, ConfigError};
use deployer_core::{
    verify_pool, ContractHandle, CreatePoolOptions, CreatedPool, Protocol, DEFAULT_APPROVAL,
};
use pool_deployer::Session;

use super::output::{format_created_pools, format_report};

#[derive(Parser, Debug)]
pub struct CreatePoolCmd {
    /// Pool key from the config (default: every configured pool)
    #[arg(long, env = "POOL")]
    pub pool: Option<String>,

    /// Print the compiled parameters of each pool
    #[arg(long)]
    pub print_params: bool,
}

impl CreatePoolCmd {
    pub async fn execute(&self, session: &mut Session, json_output: bool) -> Result<()> {
        let mut protocol = session.load_protocol()?;
        let selected: Vec<CompiledPool> = match &self.pool {
            Some(key) => vec![session.compiled.pool(key)?.clone()],
            None => session.compiled.pools.values().cloned().collect(),
        };
        if selected.is_empty() {
            return Err(ConfigError::NoPools.into());
        }

        let mut created = Vec::with_capacity(selected.len());
        for pool in &selected {
            let outcome = create_one(session, &mut protocol, pool).await?;
            session.save(&protocol)?;
            created.push(outcome);
        }

        println!(
            "{}",
            format_created_pools(&created, self.print_params, json_output)
        );
        Ok(())
    }
}

/// Oracle registration, approvals, creation and shutdown config of one pool.
async fn create_one(
    session: &Session,
    protocol: &mut Protocol,
    pool: &CompiledPool,
) -> Result<CreatedPool> {
    let params = if session.is_devnet_env() {
        patch_with_env(pool, &protocol.asset_addresses()?, session.deployer.account())?
    } else {
        pool.clone()
    };

    if let Some(existing) = protocol.pools.get(&params.key) {
        info!(pool = %params.key, address = %existing, "pool already recorded");
        return Ok(CreatedPool {
            handle: existing.clone(),
            params,
            transaction: None,
        });
    }

    protocol
        .add_assets_to_oracle(&params.pragma_oracle_params)
        .await?;

    let assets: Vec<ContractHandle> = params
        .assets()
        .into_iter()
        .filter(|address| !address.felt().is_zero())
        .enumerate()
        .map(|(index, address)| {
            session
                .deployer
                .load_contract(format!("{} asset{}", params.key, index), address)
        })
        .collect();
    protocol
        .set_approvals(&protocol.pool_factory, &assets, DEFAULT_APPROVAL)
        .await?;

    let created = protocol
        .create_pool(&params, CreatePoolOptions::default())
        .await?;
    if !created.existed() {
        protocol.configure_shutdown(&created.handle, &params).await?;
    }
    Ok(created)
}

#[derive(Parser, Debug)]
pub struct VerifyPoolCmd {
    /// Pool key or pool address
    #[arg(long, env = "POOL")]
    pub pool: String,
}

impl VerifyPoolCmd {
    pub async fn execute(&self, session: &Session, json_output: bool) -> Result<()> {
        let protocol = session.load_protocol()?;
        let (key, handle) = find_pool(&protocol, &self.pool)
            .ok_or_else(|| anyhow!("pool '{}' is not in the record or the config", self.pool))?;

        let compiled = session.compiled.pool(&key)?;
        let params = if session.is_devnet_env() {
            patch_with_env(compiled, &protocol.asset_addresses()?, session.deployer.account())?
        } else {
            compiled.clone()
        };

        let report = verify_pool(&session.deployer, &handle, &protocol.oracle, &params).await;
        println!("{}", format_report(&report, json_output));
        if report.is_ok() {
            Ok(())
        } else {
            Err(anyhow!(
                "pool {} differs from its config in {} field(s)",
                key,
                report.mismatches.len()
            ))
        }
    }
}

fn find_pool(protocol: &Protocol, wanted: &str) -> Option<(String, ContractHandle)> {
    if let Some(handle) = protocol.pools.get(wanted) {
        return Some((wanted.to_string(), handle.clone()));
    }
    let address = deployer_types::Address::parse(wanted, "pool").ok()?;
    protocol
        .pools
        .iter()
        .find(|(_, handle)| handle.try_address() == Some(address))
        .map(|(key, handle)| (key.clone(), handle.clone()))
}
