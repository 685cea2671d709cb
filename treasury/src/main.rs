//! Cinder Treasury CLI
//!
//! Mints the token supply to its ceiling, burns harvested transfer fees and
//! verifies the transfer fee on a live ledger.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::ExitCode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinder_treasury::{
    commands::{self, exit_code, print_error, Invocation},
    config::{default_config_path, Settings},
};

#[derive(Parser)]
#[command(name = "cinder-treasury")]
#[command(about = "Cinder treasury operator - supply minting and fee burning")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Deployment record path
    #[arg(short, long, global = true)]
    deployment: Option<PathBuf>,

    /// Treasury key file (otherwise read from CINDER_TREASURY_KEY)
    #[arg(short, long, global = true)]
    keypair: Option<PathBuf>,

    /// Ledger gateway URL
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint the deficit between supply and the recorded ceiling
    MintToCeiling,

    /// Harvest withheld fees, withdraw them to the vault and burn them
    RunFeeHarvestCycle {
        /// Harvest from every holding account that reports withheld fees
        #[arg(long)]
        sweep: bool,

        /// Additional account to harvest from (repeatable)
        #[arg(long = "account", value_name = "ADDRESS")]
        accounts: Vec<String>,
    },

    /// Send a probe transfer and check the fee actually withheld
    VerifyTransferFee {
        /// Probe amount in token units
        amount: String,

        /// Owner of the recipient account (defaults to a per-mint probe
        /// address)
        #[arg(long)]
        recipient: Option<String>,
    },

    /// Show supply, fee configuration and vault balance
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&format!("{:#}", e));
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let settings = Settings::load_or_default(&config_path)?;

    let invocation = Invocation {
        deployment: settings.deployment_path(cli.deployment.as_deref()),
        keypair: cli.keypair.or_else(|| settings.keypair.clone()),
        rpc_url: cli.rpc_url,
        settings,
    };

    match cli.command {
        Commands::MintToCeiling => commands::mint::run(&invocation).await,
        Commands::RunFeeHarvestCycle { sweep, accounts } => {
            commands::harvest::run(&invocation, sweep, &accounts).await
        }
        Commands::VerifyTransferFee { amount, recipient } => {
            commands::verify::run(&invocation, &amount, recipient.as_deref()).await
        }
        Commands::Status => commands::status::run(&invocation).await,
    }
}
