//! pool-deployer: deploy and configure a lending protocol from a config file
//!
//! ## Commands
//!
//! - **deploy-environment**: mock assets, mock price feeds and the protocol (devnet)
//! - **deploy-protocol**: oracle adapter and pool factory over existing price feeds
//! - **create-pool**: create the pools defined in the config
//! - **verify-pool**: compare an on-ledger pool with its config
//! - **upgrade**: declare new classes and upgrade the factory and every pool
//! - **compile**: print compiled pool parameters without touching the ledger
//!
//! ## Example Usage
//!
//! ```bash
//! # Rehearse a devnet deployment without a node
//! pool-deployer --network devnet --simulate deploy-environment
//!
//! # Create one pool on sepolia
//! RPC_URL=https://... ADDRESS=0x... pool-deployer --network sepolia create-pool --pool genesis
//!
//! # Check a pool by address
//! pool-deployer --network mainnet verify-pool --pool 0x04f1...
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use deployer_cache::artifacts::{DEFAULT_ARTIFACTS_DIR, DEFAULT_PACKAGE};
use deployer_transport::network::DEFAULT_RPC_URL;
use pool_deployer::{Session, SessionOptions};

mod deploy_cli;

use deploy_cli::{
    compile::CompileCmd,
    deploy::{DeployEnvironmentCmd, DeployProtocolCmd},
    output::format_error,
    pool::{CreatePoolCmd, VerifyPoolCmd},
    upgrade::UpgradeCmd,
};

#[derive(Parser)]
#[command(
    name = "pool-deployer",
    author,
    version,
    about = "Deploy and configure lending pools",
    long_about = "Deploys the lending protocol and its pools from a declarative config.\n\n\
                  Every run reads and updates a deployment record, so later runs load \
                  contracts instead of deploying them again."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Deployment config (default: config/<network>.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Deployment record read at startup and written after every successful batch
    #[arg(long, global = true, default_value = "deployment.json")]
    record: PathBuf,

    /// Target network; must match NETWORK when that variable is set
    #[arg(long, global = true)]
    network: Option<String>,

    /// Ledger gateway endpoint
    #[arg(long, global = true, env = "RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,

    /// Signing account address
    #[arg(long, global = true, env = "ADDRESS")]
    account: Option<String>,

    /// Directory holding compiled contract classes
    #[arg(long, global = true, env = "ARTIFACTS_DIR", default_value = DEFAULT_ARTIFACTS_DIR)]
    artifacts: PathBuf,

    /// Package prefix of the artifact file names
    #[arg(long, global = true, default_value = DEFAULT_PACKAGE)]
    package: String,

    /// Run against an in-process ledger instead of --rpc-url
    #[arg(long, global = true)]
    simulate: bool,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (debug logging)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy mock assets, mock price feeds and the protocol, then approve the factory
    DeployEnvironment(DeployEnvironmentCmd),

    /// Deploy the oracle adapter and pool factory over existing price feeds
    DeployProtocol(DeployProtocolCmd),

    /// Create pools defined in the config
    CreatePool(CreatePoolCmd),

    /// Compare an on-ledger pool with its compiled config
    VerifyPool(VerifyPoolCmd),

    /// Declare new classes and upgrade the factory and every recorded pool
    Upgrade(UpgradeCmd),

    /// Print compiled pool parameters without touching the ledger
    Compile(CompileCmd),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::DeployEnvironment(_) => "deploy-environment",
            Commands::DeployProtocol(_) => "deploy-protocol",
            Commands::CreatePool(_) => "create-pool",
            Commands::VerifyPool(_) => "verify-pool",
            Commands::Upgrade(_) => "upgrade",
            Commands::Compile(_) => "compile",
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let json = cli.json;
    let command = cli.command.name();

    if let Err(e) = run(cli).await {
        eprintln!("{}", format_error(command, &e, json));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let Cli {
        command,
        config,
        record,
        network,
        rpc_url,
        account,
        artifacts,
        package,
        simulate,
        json,
        verbose: _,
    } = cli;
    let config = config.unwrap_or_else(|| {
        PathBuf::from("config").join(format!("{}.json", network.as_deref().unwrap_or("devnet")))
    });

    if let Commands::Compile(cmd) = &command {
        return cmd.execute(&config, json);
    }

    let options = SessionOptions {
        config,
        record,
        network,
        rpc_url,
        account,
        artifacts,
        package,
        simulate,
    };
    let mut session = Session::open(&options)?;

    match command {
        Commands::DeployEnvironment(cmd) => cmd.execute(&mut session, json).await,
        Commands::DeployProtocol(cmd) => cmd.execute(&mut session, json).await,
        Commands::CreatePool(cmd) => cmd.execute(&mut session, json).await,
        Commands::VerifyPool(cmd) => cmd.execute(&session, json).await,
        Commands::Upgrade(cmd) => cmd.execute(&mut session, json).await,
        Commands::Compile(_) => Ok(()),
    }
}
