mod commands;

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

// ============================================================================
// CLI Types
// ============================================================================

/// Chitai - live reading sessions shared between a controller and displays
#[derive(Parser, Debug)]
#[command(version = chitai::build_info::VERSION, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the session server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "chitai.yaml", env = "CHITAI_CONFIG")]
        config: String,

        /// Host to bind to (overrides config file)
        #[arg(long)]
        host: Option<IpAddr>,

        /// Port to listen on (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Record journal directory (overrides config file). Without one,
        /// records are kept in memory only.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Link an illustration to an item in the record journal
    LinkIllustration {
        /// Item ID
        item_id: String,

        /// Illustration ID
        illustration_id: String,

        /// Path to configuration file
        #[arg(short, long, default_value = "chitai.yaml", env = "CHITAI_CONFIG")]
        config: String,

        /// Record journal directory (overrides config file)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
        } => commands::serve::run(&config, host, port, data_dir.as_deref()).await,
        Commands::LinkIllustration {
            item_id,
            illustration_id,
            config,
            data_dir,
        } => {
            commands::link::run(&config, data_dir.as_deref(), &item_id, &illustration_id).await
        }
    }
}

// ============================================================================
// Initialization
// ============================================================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
