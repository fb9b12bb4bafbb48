//! Compile command - print ledger-ready pool parameters

use std::path::Path;

use anyhow::Result;
use clap::Parser;

use deployer_config::{compile, load_config};

#[derive(Parser, Debug)]
pub struct CompileCmd {
    /// Only print this pool
    #[arg(long, env = "POOL")]
    pub pool: Option<String>,
}

impl CompileCmd {
    pub fn execute(&self, config_path: &Path, json_output: bool) -> Result<()> {
        let config = load_config(config_path)?;
        let compiled = compile(&config)?;

        let rendered = match &self.pool {
            Some(key) => serde_json::to_string_pretty(compiled.pool(key)?)?,
            None => serde_json::to_string_pretty(&compiled)?,
        };
        if !json_output {
            eprintln!(
                "Compiled {} pool(s) for {}",
                compiled.pools.len(),
                compiled.network
            );
        }
        println!("{}", rendered);
        Ok(())
    }
}
