//! querygate CLI - parameterized query API over the catalog and payments stores
//!
//! Subcommands:
//! - `serve`: run the HTTP API (/user, /search, /invoice, /refund, /health)
//! - `config`: show or validate the effective configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod tracing_setup;

use tracing_setup::{init_tracing, TracingConfig};

#[derive(Parser, Debug)]
#[command(
    name = "querygate",
    author,
    version,
    about = "Parameterized query API for the catalog and payments stores"
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: ~/.querygate/config.toml)
    #[arg(long, global = true, env = "QUERYGATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(commands::serve::ServeArgs),
    /// Inspect configuration (show, check, path)
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Before tracing, so RUST_LOG from .env applies
    config::load_dotenv();
    init_tracing(&TracingConfig { debug: cli.debug })?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve(args) => commands::serve::run_serve(args, config_path).await,
        Commands::Config(args) => commands::config::run_config(args, config_path),
    }
}
