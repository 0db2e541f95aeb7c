//! pricegrid - flexible-date fare matrix browser
//!
//! Main entry point for the pricegrid CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{batch, browse, config, matrix, status};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// pricegrid - flexible-date fare matrix browser
#[derive(Parser)]
#[command(name = "pricegrid")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Pricing service URL (default: from config, then http://127.0.0.1:3000)
    #[arg(long, global = true, env = "PRICEGRID_SERVER_URL")]
    pub server: Option<String>,

    /// Directory holding config.toml and logs
    #[arg(long, global = true, env = "PRICEGRID_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load the price matrix around a pair of dates
    Matrix(matrix::MatrixArgs),

    /// Navigate the price matrix interactively
    Browse(browse::BrowseArgs),

    /// Fetch a price matrix in one request, without streaming
    Batch(batch::BatchArgs),

    /// Check whether the pricing service is reachable
    Status(status::StatusArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console on stderr so --json output stays clean; JSON file at trace
    let filter = if cli.verbose {
        "pricegrid=debug,pricegrid_client=debug,pricegrid_matrix=debug,pricegrid_config=debug,info"
    } else {
        "pricegrid=info,pricegrid_client=warn,pricegrid_matrix=warn,warn"
    };

    let log_dir = pricegrid_config::log_dir(cli.config_dir.as_deref())
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "pricegrid.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "pricegrid=trace,pricegrid_client=trace,pricegrid_matrix=trace,pricegrid_config=trace,info",
                )),
        )
        .init();

    let loaded = pricegrid_config::load_config_with_options(None, cli.config_dir.as_deref())?;
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let server_url = cli
        .server
        .unwrap_or_else(|| loaded.config.server().base_url);

    let ctx = commands::Context {
        server_url,
        json_output: cli.json,
        verbose: cli.verbose,
        config: loaded.config,
        config_dir: cli.config_dir,
    };

    match cli.command {
        Commands::Matrix(args) => matrix::run(args, &ctx).await,
        Commands::Browse(args) => browse::run(args, &ctx).await,
        Commands::Batch(args) => batch::run(args, &ctx).await,
        Commands::Status(args) => status::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
