//! Upgrade command - move the factory and every known pool to freshly declared classes

use anyhow::Result;
use clap::Parser;

use pool_deployer::Session;

use super::output::format_upgrade;

#[derive(Parser, Debug)]
pub struct UpgradeCmd {}

impl UpgradeCmd {
    pub async fn execute(&self, session: &mut Session, json_output: bool) -> Result<()> {
        let protocol = session.load_protocol()?;
        let summary = protocol.upgrade().await?;
        session.save(&protocol)?;
        println!("{}", format_upgrade(&summary, json_output));
        Ok(())
    }
}
