//! Store connection configuration
//!
//! One [`ConnectionConfig`] per logical store, built once at startup from an
//! external secret source and injected into the
//! [`ConnectionManager`](super::ConnectionManager). The password is never
//! exposed through `Debug`, `Display`, or error text.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

/// Logical stores. Each one owns an independent pool and credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Store {
    /// Users and products
    Catalog,
    /// Invoices and payment ledger
    Payments,
}

impl Store {
    pub const ALL: [Store; 2] = [Store::Catalog, Store::Payments];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Payments => "payments",
        }
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database engine behind a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Mysql,
    /// File-backed store for local development and tests
    Sqlite,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(Self::Mysql),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ConfigError::UnknownBackend(other.to_owned())),
        }
    }
}

/// Configuration error. Never carries credential text.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{store} store: {field} is required")]
    Missing { store: Store, field: &'static str },

    #[error("{store} store: {reason}")]
    Invalid { store: Store, reason: &'static str },

    #[error("unknown backend '{0}', expected 'mysql' or 'sqlite'")]
    UnknownBackend(String),

    #[error("pool settings: {field} must be greater than zero")]
    InvalidPool { field: &'static str },
}

/// Connection settings for one store.
///
/// Immutable once built. `Debug` redacts the password.
#[derive(Clone)]
pub struct ConnectionConfig {
    backend: Backend,
    host: String,
    port: Option<u16>,
    user: String,
    password: String,
    database: String,
}

impl ConnectionConfig {
    /// MySQL store settings.
    pub fn mysql(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            backend: Backend::Mysql,
            host: host.into(),
            port: None,
            user: user.into(),
            password: password.into(),
            database: database.into(),
        }
    }

    /// SQLite store settings; `path` is created if it does not exist.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            backend: Backend::Sqlite,
            host: String::new(),
            port: None,
            user: String::new(),
            password: String::new(),
            database: path.into(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    /// Check that every field the backend needs is present.
    pub fn validate(&self, store: Store) -> Result<(), ConfigError> {
        if self.database.is_empty() {
            return Err(ConfigError::Missing {
                store,
                field: "database",
            });
        }

        match self.backend {
            Backend::Mysql => {
                if self.host.is_empty() {
                    return Err(ConfigError::Missing { store, field: "host" });
                }
                if self.user.is_empty() {
                    return Err(ConfigError::Missing { store, field: "user" });
                }
            }
            Backend::Sqlite => {
                if self.database.contains(['?', '#']) {
                    return Err(ConfigError::Invalid {
                        store,
                        reason: "sqlite path must not contain '?' or '#'",
                    });
                }
            }
        }

        Ok(())
    }

    /// Connection URL with credentials percent-encoded.
    ///
    /// The result contains the password; it must not be logged.
    pub(crate) fn connect_url(&self, store: Store) -> Result<Url, ConfigError> {
        self.validate(store)?;

        match self.backend {
            Backend::Mysql => {
                let invalid = |reason| ConfigError::Invalid { store, reason };

                let mut url = Url::parse("mysql://localhost").map_err(|_| invalid("malformed url"))?;
                url.set_host(Some(&self.host))
                    .map_err(|_| invalid("malformed host"))?;
                url.set_port(self.port).map_err(|_| invalid("malformed port"))?;
                url.set_username(&self.user)
                    .map_err(|_| invalid("malformed user"))?;
                if !self.password.is_empty() {
                    url.set_password(Some(&self.password))
                        .map_err(|_| invalid("malformed password"))?;
                }
                url.set_path(&self.database);
                Ok(url)
            }
            Backend::Sqlite => Url::parse(&format!("sqlite://{}?mode=rwc", self.database))
                .map_err(|_| ConfigError::Invalid {
                    store,
                    reason: "malformed sqlite path",
                }),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Pool sizing and timing, shared by both stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Connections per store
    pub max_connections: u32,
    /// How long `acquire` waits for a free connection before `PoolExhausted`
    pub acquire_timeout_ms: u64,
    /// Per-statement execution limit
    pub statement_timeout_ms: u64,
    /// Attempts for transient connection failures (including the first)
    pub connect_attempts: u32,
    /// Initial backoff between attempts, doubled each retry
    pub retry_backoff_ms: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout_ms: 5_000,
            statement_timeout_ms: 10_000,
            connect_attempts: 3,
            retry_backoff_ms: 100,
        }
    }
}

impl PoolSettings {
    /// Reject settings that would leave a pool unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let zero = [
            ("max_connections", self.max_connections == 0),
            ("acquire_timeout_ms", self.acquire_timeout_ms == 0),
            ("statement_timeout_ms", self.statement_timeout_ms == 0),
            ("connect_attempts", self.connect_attempts == 0),
        ];

        match zero.into_iter().find(|(_, is_zero)| *is_zero) {
            Some((field, _)) => Err(ConfigError::InvalidPool { field }),
            None => Ok(()),
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
