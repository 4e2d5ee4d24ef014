//! Config command: inspect and validate the effective configuration
//!
//! Output never includes passwords, only whether one is set.

use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};

use querygate_server::db::{Backend, ConnectionConfig, Store};

use crate::config::{self, EnvSecrets};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration (passwords redacted)
    Show,
    /// Validate configuration and exit
    Check,
    /// Print the default config file path
    Path,
}

pub fn run_config(args: ConfigArgs, config_path: Option<&Path>) -> Result<()> {
    match args.action {
        ConfigAction::Show => show(config_path),
        ConfigAction::Check => check(config_path),
        ConfigAction::Path => {
            match config::default_config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("(no home directory)"),
            }
            Ok(())
        }
    }
}

fn show(config_path: Option<&Path>) -> Result<()> {
    let file = config::load(config_path)?;
    let (catalog, payments) = file.stores(&EnvSecrets)?;

    println!("[server]");
    match file.server.bind {
        Some(bind) => println!("bind = {}", bind),
        None => println!("bind = (default)"),
    }
    println!("cors_permissive = {}", file.server.cors_permissive);
    println!();

    let pool = &file.pool;
    println!("[pool]");
    println!("max_connections = {}", pool.max_connections);
    println!("acquire_timeout_ms = {}", pool.acquire_timeout_ms);
    println!("statement_timeout_ms = {}", pool.statement_timeout_ms);
    println!("connect_attempts = {}", pool.connect_attempts);
    println!("retry_backoff_ms = {}", pool.retry_backoff_ms);

    for (store, store_config) in [(Store::Catalog, &catalog), (Store::Payments, &payments)] {
        println!();
        print_store(store, store_config);
    }

    Ok(())
}

fn print_store(store: Store, config: &ConnectionConfig) {
    println!("[{}]", store);
    println!("backend = {}", config.backend().as_str());
    match config.backend() {
        Backend::Mysql => {
            println!("host = {}", config.host());
            match config.port() {
                Some(port) => println!("port = {}", port),
                None => println!("port = (default)"),
            }
            println!("user = {}", config.user());
            println!("database = {}", config.database());
            let password = if config.has_password() { "<set>" } else { "<unset>" };
            println!("password = {}", password);
        }
        Backend::Sqlite => println!("path = {}", config.database()),
    }
}

fn check(config_path: Option<&Path>) -> Result<()> {
    let file = config::load(config_path)?;
    let (catalog, payments) = file.stores(&EnvSecrets)?;

    // Also catches what only shows up while building the connection URL
    querygate_server::db::ConnectionManager::new(&catalog, &payments, file.pool)?;

    println!("configuration ok");
    Ok(())
}
