//! CLI subcommand implementations for pool-deployer

pub mod compile;
pub mod deploy;
pub mod output;
pub mod pool;
pub mod upgrade;
