//! meshlinkd - the per-node meshlink agent.
//!
//! # Quick start
//!
//! ```bash
//! # Bootstrap a node's local identity and config
//! meshlinkd init ./data --network prod
//!
//! # Run the reconciler and ownership sweeper until Ctrl+C
//! meshlinkd up ./data
//!
//! # Print the local node's identity without starting anything
//! meshlinkd status ./data
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "meshlinkd")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap a node's data directory: generates its keypair and writes
    /// its initial local state and configuration.
    Init {
        /// Path to the node's data directory.
        path: String,

        /// Network name (selects deterministic default ports/interface).
        #[arg(long, default_value = "default")]
        network: String,

        /// Overwrite an existing state file instead of failing.
        #[arg(long)]
        force: bool,
    },

    /// Claim a subnet and run the reconciler and ownership sweeper until
    /// interrupted.
    Up {
        /// Path to the node's data directory.
        path: String,
    },

    /// Tear down this node's local data-plane state.
    Down {
        /// Path to the node's data directory.
        path: String,

        /// Also delete the local state file.
        #[arg(long)]
        purge: bool,
    },

    /// Print the local node's identity and configuration.
    Status {
        /// Path to the node's data directory.
        path: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new()?;
    match cli.command {
        Commands::Init {
            path,
            network,
            force,
        } => commands::init::run(&path, &network, force),
        Commands::Up { path } => runtime.block_on(commands::up::run(&path)),
        Commands::Down { path, purge } => runtime.block_on(commands::down::run(&path, purge)),
        Commands::Status { path } => commands::status::run(&path),
    }
}
