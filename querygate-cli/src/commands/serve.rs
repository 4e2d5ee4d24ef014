//! HTTP server command
//!
//! Resolves both store configurations, builds the lazy pools, and runs the
//! query API until shutdown.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use querygate_server::db::ConnectionManager;
use querygate_server::http::{run_server, ServerConfig};

use crate::config::{self, EnvSecrets};

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (default: 127.0.0.1:3000)
    #[arg(long, short = 'b', env = "QUERYGATE_BIND")]
    pub bind: Option<SocketAddr>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs, config_path: Option<&Path>) -> Result<()> {
    let file = config::load(config_path)?;
    let (catalog, payments) = file.stores(&EnvSecrets)?;

    let manager = ConnectionManager::new(&catalog, &payments, file.pool)
        .context("Failed to configure connection pools")?;

    let server = ServerConfig {
        bind_addr: args
            .bind
            .or(file.server.bind)
            .unwrap_or_else(|| ServerConfig::default().bind_addr),
        cors_permissive: args.cors_permissive || file.server.cors_permissive,
    };

    tracing::info!(
        catalog = catalog.backend().as_str(),
        payments = payments.backend().as_str(),
        max_connections = file.pool.max_connections,
        "Starting querygate server on {}",
        server.bind_addr
    );

    // Run server (blocks until shutdown)
    run_server(manager, server).await.context("Server error")?;

    Ok(())
}
