//! Configuration loading for querygate
//!
//! Non-secret settings live in `~/.querygate/config.toml` (or `--config`):
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:3000"
//!
//! [pool]
//! max_connections = 5
//! acquire_timeout_ms = 5000
//!
//! [catalog]
//! backend = "mysql"
//! host = "db.internal"
//! user = "catalog_app"
//! database = "myapp"
//! ```
//!
//! Passwords are never read from the file. They come from the environment
//! (`QUERYGATE_CATALOG_PASSWORD`, `QUERYGATE_PAYMENTS_PASSWORD`), which also
//! overrides any file value via `QUERYGATE_<STORE>_{BACKEND,HOST,PORT,USER,DATABASE}`.

use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use querygate_server::db::{Backend, ConnectionConfig, PoolSettings, Store};

/// Contents of the config file
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub pool: PoolSettings,
    pub catalog: StoreSection,
    pub payments: StoreSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub bind: Option<SocketAddr>,
    pub cors_permissive: bool,
}

/// Per-store connection settings, minus the password
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    pub backend: Option<Backend>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub database: Option<String>,
}

impl FileConfig {
    fn section(&self, store: Store) -> &StoreSection {
        match store {
            Store::Catalog => &self.catalog,
            Store::Payments => &self.payments,
        }
    }

    /// Resolve connection settings for both stores.
    pub fn stores(&self, secrets: &impl SecretSource) -> Result<(ConnectionConfig, ConnectionConfig)> {
        Ok((
            resolve_store(Store::Catalog, self.section(Store::Catalog), secrets)?,
            resolve_store(Store::Payments, self.section(Store::Payments), secrets)?,
        ))
    }
}

/// Where secrets and overrides come from
pub trait SecretSource {
    fn secret(&self, key: &str) -> Option<String>;
}

/// Process environment (after `.env` loading)
pub struct EnvSecrets;

impl SecretSource for EnvSecrets {
    fn secret(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

impl SecretSource for HashMap<String, String> {
    fn secret(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

/// Environment variable name for a store setting.
pub fn env_key(store: Store, field: &str) -> String {
    format!("QUERYGATE_{}_{}", store.as_str().to_ascii_uppercase(), field)
}

fn default_database(store: Store) -> &'static str {
    match store {
        Store::Catalog => "myapp",
        Store::Payments => "payments",
    }
}

fn resolve_store(
    store: Store,
    section: &StoreSection,
    secrets: &impl SecretSource,
) -> Result<ConnectionConfig> {
    let lookup = |field: &str| secrets.secret(&env_key(store, field));

    let backend = match lookup("BACKEND") {
        Some(raw) => raw.parse::<Backend>()?,
        None => section.backend.unwrap_or_default(),
    };
    let database = lookup("DATABASE").or_else(|| section.database.clone());

    let config = match backend {
        Backend::Sqlite => {
            ConnectionConfig::sqlite(database.unwrap_or_else(|| format!("{}.db", store)))
        }
        Backend::Mysql => {
            let host = lookup("HOST")
                .or_else(|| section.host.clone())
                .unwrap_or_else(|| "localhost".to_owned());
            let user = lookup("USER").or_else(|| section.user.clone()).unwrap_or_default();
            let password = lookup("PASSWORD").unwrap_or_default();
            if password.is_empty() {
                warn!(store = %store, "no password set ({})", env_key(store, "PASSWORD"));
            }

            let config = ConnectionConfig::mysql(
                host,
                user,
                password,
                database.unwrap_or_else(|| default_database(store).to_owned()),
            );

            let port = match lookup("PORT") {
                Some(raw) => Some(
                    raw.parse::<u16>()
                        .with_context(|| format!("{} is not a valid port", env_key(store, "PORT")))?,
                ),
                None => section.port,
            };
            match port {
                Some(port) => config.with_port(port),
                None => config,
            }
        }
    };

    config.validate(store)?;
    debug!(store = %store, backend = config.backend().as_str(), "store configuration resolved");
    Ok(config)
}

/// Get the querygate config directory path (~/.querygate)
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".querygate"))
}

/// Default config file path (~/.querygate/config.toml)
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Load the config file.
///
/// An explicit path must exist; the default path is optional.
pub fn load(path: Option<&Path>) -> Result<FileConfig> {
    match path {
        Some(path) => read(path),
        None => match default_config_path() {
            Some(path) if path.exists() => read(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(FileConfig::default())
            }
        },
    }
}

fn read(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = parse(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Parse config text, refusing any password entry.
///
/// Checked before typed deserialization so the error never quotes the
/// offending line.
pub fn parse(content: &str) -> Result<FileConfig> {
    let table: toml::Table = content.parse().context("invalid TOML")?;

    for store in Store::ALL {
        let has_password = table
            .get(store.as_str())
            .and_then(|section| section.as_table())
            .is_some_and(|section| section.contains_key("password"));
        if has_password {
            bail!(
                "[{}] password must not be stored in the config file; set {} instead",
                store,
                env_key(store, "PASSWORD")
            );
        }
    }

    toml::Value::Table(table)
        .try_into::<FileConfig>()
        .context("invalid configuration")
}

/// Load `.env` files into the environment.
///
/// Priority order (highest to lowest):
/// 1. Environment variables already set
/// 2. Current directory .env
/// 3. ~/.querygate/.env
pub fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded .env from current directory: {}", path.display());
    }

    if let Some(env_file) = config_dir().map(|dir| dir.join(".env")) {
        if env_file.exists() {
            // dotenvy doesn't overwrite existing vars
            match dotenvy::from_path(&env_file) {
                Ok(_) => debug!("Loaded .env from {}", env_file.display()),
                Err(e) => debug!("Failed to load {}: {}", env_file.display(), e),
            }
        }
    }
}
