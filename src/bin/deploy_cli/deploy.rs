//! Deploy commands - environment and protocol contracts

use anyhow::Result;
use clap::Parser;

use pool_deployer::Session;

use super::output::format_record;

#[derive(Parser, Debug)]
pub struct DeployEnvironmentCmd {}

impl DeployEnvironmentCmd {
    pub async fn execute(&self, session: &mut Session, json_output: bool) -> Result<()> {
        let protocol = session
            .protocol_deployer()
            .deploy_env_and_protocol()
            .await?;
        session.save(&protocol)?;

        println!(
            "{}",
            format_record(
                "Deployed environment and protocol",
                &session.record,
                session.store.path(),
                session.deployer.cache().metrics().snapshot(),
                json_output,
            )
        );
        Ok(())
    }
}

#[derive(Parser, Debug)]
pub struct DeployProtocolCmd {}

impl DeployProtocolCmd {
    pub async fn execute(&self, session: &mut Session, json_output: bool) -> Result<()> {
        let deployer = session.protocol_deployer();
        let pragma = deployer.load_pragma(&session.record, &session.config.protocol)?;
        let protocol = deployer.deploy_protocol(pragma).await?;
        session.save(&protocol)?;

        println!(
            "{}",
            format_record(
                "Deployed protocol",
                &session.record,
                session.store.path(),
                session.deployer.cache().metrics().snapshot(),
                json_output,
            )
        );
        Ok(())
    }
}
