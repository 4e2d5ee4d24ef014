//! Connection Manager - one bounded pool per logical store
//!
//! Each store gets a pool typed for its backend: MySQL in production,
//! SQLite in development and tests. Pools are created lazily: a store that
//! is down at startup only fails the requests that need it.
//!
//! Handle lifecycle: `Idle -> Acquired -> InUse -> Released | Discarded`.
//! Dropping a [`ConnectionHandle`] releases it, so every exit path returns
//! the connection; [`ConnectionHandle::discard`] closes it instead.

use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlPool};
use sqlx::pool::{PoolConnection, PoolOptions};
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool};
use sqlx::Database;

use super::{Backend, ConfigError, ConnectionConfig, PoolSettings, Store};
use crate::error::{is_auth_failure, QueryError};

/// Point-in-time pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Open connections, idle or in use
    pub size: u32,
    pub idle: usize,
}

/// Owner of the per-store pools.
///
/// Cheap to clone; clones share the same pools.
#[derive(Clone)]
pub struct ConnectionManager {
    catalog: StorePool,
    payments: StorePool,
    settings: PoolSettings,
    next_handle: Arc<AtomicU64>,
}

impl ConnectionManager {
    /// Build lazy pools for both stores. No connection is opened here.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        catalog: &ConnectionConfig,
        payments: &ConnectionConfig,
        settings: PoolSettings,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;

        Ok(Self {
            catalog: lazy_pool(Store::Catalog, catalog, &settings)?,
            payments: lazy_pool(Store::Payments, payments, &settings)?,
            settings,
            next_handle: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    fn pool(&self, store: Store) -> &StorePool {
        match store {
            Store::Catalog => &self.catalog,
            Store::Payments => &self.payments,
        }
    }

    /// Acquire an exclusive handle on one of `store`'s connections.
    ///
    /// Waits up to the acquire timeout when the pool is at capacity, then
    /// fails with [`QueryError::PoolExhausted`]. Transient network faults
    /// are retried with backoff; rejected credentials fail immediately.
    pub async fn acquire(&self, store: Store) -> Result<ConnectionHandle, QueryError> {
        let pool = self.pool(store);
        let conn = retry_transient(store, &self.settings, || pool.acquire()).await?;

        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(store = %store, handle = id, "connection acquired");

        Ok(ConnectionHandle { id, store, conn })
    }

    pub fn stats(&self, store: Store) -> PoolStats {
        let pool = self.pool(store);
        PoolStats {
            size: pool.size(),
            idle: pool.num_idle(),
        }
    }

    /// Close both pools. Waits for handles in use to be returned.
    pub async fn close(&self) {
        self.catalog.close().await;
        self.payments.close().await;
        tracing::info!("connection pools closed");
    }
}

/// Pool for one store, typed by its backend
#[derive(Clone)]
enum StorePool {
    Mysql(MySqlPool),
    Sqlite(SqlitePool),
}

impl StorePool {
    async fn acquire(&self) -> Result<StoreConnection, sqlx::Error> {
        match self {
            Self::Mysql(pool) => pool.acquire().await.map(StoreConnection::Mysql),
            Self::Sqlite(pool) => pool.acquire().await.map(StoreConnection::Sqlite),
        }
    }

    fn size(&self) -> u32 {
        match self {
            Self::Mysql(pool) => pool.size(),
            Self::Sqlite(pool) => pool.size(),
        }
    }

    fn num_idle(&self) -> usize {
        match self {
            Self::Mysql(pool) => pool.num_idle(),
            Self::Sqlite(pool) => pool.num_idle(),
        }
    }

    async fn close(&self) {
        match self {
            Self::Mysql(pool) => pool.close().await,
            Self::Sqlite(pool) => pool.close().await,
        }
    }
}

/// A pooled connection on either backend.
pub(crate) enum StoreConnection {
    Mysql(PoolConnection<MySql>),
    Sqlite(PoolConnection<Sqlite>),
}

impl StoreConnection {
    async fn close(self) -> Result<(), sqlx::Error> {
        match self {
            Self::Mysql(conn) => conn.close().await,
            Self::Sqlite(conn) => conn.close().await,
        }
    }
}

fn pool_options<DB: Database>(settings: &PoolSettings) -> PoolOptions<DB> {
    PoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout())
}

fn lazy_pool(
    store: Store,
    config: &ConnectionConfig,
    settings: &PoolSettings,
) -> Result<StorePool, ConfigError> {
    let url = config.connect_url(store)?;
    // The parse error can echo the url, which holds the password
    let rejected = |_: sqlx::Error| ConfigError::Invalid {
        store,
        reason: "connection settings rejected by driver",
    };

    let pool = match config.backend() {
        Backend::Mysql => {
            let options = MySqlConnectOptions::from_str(url.as_str()).map_err(rejected)?;
            StorePool::Mysql(pool_options(settings).connect_lazy_with(options))
        }
        Backend::Sqlite => {
            let options = SqliteConnectOptions::from_str(url.as_str()).map_err(rejected)?;
            StorePool::Sqlite(pool_options(settings).connect_lazy_with(options))
        }
    };

    tracing::debug!(
        store = %store,
        backend = config.backend().as_str(),
        max_connections = settings.max_connections,
        "pool configured"
    );

    Ok(pool)
}

/// How an acquire failure is handled.
#[derive(Debug, PartialEq, Eq)]
enum AcquireFailure {
    /// Bounded wait elapsed with the pool at capacity
    Exhausted,
    /// Network-level fault worth another attempt
    Transient,
    Fatal(&'static str),
}

fn classify_acquire(err: &sqlx::Error) -> AcquireFailure {
    match err {
        sqlx::Error::PoolTimedOut => AcquireFailure::Exhausted,
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::WorkerCrashed => AcquireFailure::Transient,
        sqlx::Error::Database(db) if is_auth_failure(db.code().as_deref()) => {
            AcquireFailure::Fatal("authentication rejected")
        }
        sqlx::Error::PoolClosed => AcquireFailure::Fatal("pool closed"),
        sqlx::Error::Configuration(_) => AcquireFailure::Fatal("configuration rejected"),
        _ => AcquireFailure::Fatal("connection refused by store"),
    }
}

/// Run `attempt` until it succeeds, retrying transient failures with
/// exponential backoff up to `settings.connect_attempts` tries.
async fn retry_transient<T, F, Fut>(
    store: Store,
    settings: &PoolSettings,
    mut attempt: F,
) -> Result<T, QueryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let max_attempts = settings.connect_attempts.max(1);
    let mut backoff = settings.retry_backoff();
    let mut tries = 1;

    loop {
        let err = match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        match classify_acquire(&err) {
            AcquireFailure::Exhausted => {
                tracing::warn!(
                    store = %store,
                    waited_ms = settings.acquire_timeout_ms,
                    "pool exhausted"
                );
                return Err(QueryError::PoolExhausted { store });
            }
            AcquireFailure::Transient if tries < max_attempts => {
                tracing::warn!(
                    store = %store,
                    attempt = tries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "transient connection failure, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2).min(Duration::from_secs(5));
                tries += 1;
            }
            AcquireFailure::Transient => {
                tracing::error!(store = %store, attempts = tries, error = %err, "store unreachable");
                return Err(QueryError::Connection {
                    store,
                    reason: "store unreachable",
                });
            }
            AcquireFailure::Fatal(reason) => {
                tracing::error!(store = %store, error = %err, "{}", reason);
                return Err(QueryError::Connection { store, reason });
            }
        }
    }
}

/// Exclusive use of one pooled connection.
///
/// Owned by exactly one in-flight execution. Dropping it returns the
/// connection to its pool.
pub struct ConnectionHandle {
    id: u64,
    store: Store,
    conn: StoreConnection,
}

impl ConnectionHandle {
    /// Process-unique handle id, for tracing
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn store(&self) -> Store {
        self.store
    }

    pub(crate) fn connection(&mut self) -> &mut StoreConnection {
        &mut self.conn
    }

    /// Return the connection to the pool.
    pub fn release(self) {
        tracing::trace!(store = %self.store, handle = self.id, "connection released");
    }

    /// Close the connection instead of pooling it; its state is not trusted.
    ///
    /// The pool slot frees up once the close completes.
    pub fn discard(self) {
        let Self { id, store, conn } = self;
        tracing::warn!(store = %store, handle = id, "discarding connection");

        tokio::spawn(async move {
            if let Err(e) = conn.close().await {
                tracing::debug!(store = %store, handle = id, error = %e, "close after discard failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::AtomicU32;
    use std::time::Instant;

    fn sqlite_manager(dir: &tempfile::TempDir, settings: PoolSettings) -> ConnectionManager {
        let catalog = ConnectionConfig::sqlite(dir.path().join("catalog.db").display().to_string());
        let payments = ConnectionConfig::sqlite(dir.path().join("payments.db").display().to_string());
        ConnectionManager::new(&catalog, &payments, settings).unwrap()
    }

    fn small_pool() -> PoolSettings {
        PoolSettings {
            max_connections: 2,
            acquire_timeout_ms: 200,
            ..PoolSettings::default()
        }
    }

    fn io_error() -> sqlx::Error {
        sqlx::Error::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
    }

    #[test]
    fn classifies_acquire_errors() {
        assert_eq!(classify_acquire(&sqlx::Error::PoolTimedOut), AcquireFailure::Exhausted);
        assert_eq!(classify_acquire(&io_error()), AcquireFailure::Transient);
        assert_eq!(
            classify_acquire(&sqlx::Error::PoolClosed),
            AcquireFailure::Fatal("pool closed")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let calls = AtomicU32::new(0);
        let result = retry_transient(Store::Catalog, &PoolSettings::default(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(io_error())
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_transient(Store::Payments, &PoolSettings::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(io_error()) }
        })
        .await;

        assert!(matches!(
            result,
            Err(QueryError::Connection {
                store: Store::Payments,
                reason: "store unreachable"
            })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_failures_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_transient(Store::Catalog, &PoolSettings::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(sqlx::Error::Configuration("bad option".into())) }
        })
        .await;

        assert!(matches!(result, Err(QueryError::Connection { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[derive(Debug)]
    struct AccessDenied(&'static str);

    impl std::fmt::Display for AccessDenied {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "access denied for user")
        }
    }

    impl std::error::Error for AccessDenied {}

    impl sqlx::error::DatabaseError for AccessDenied {
        fn message(&self) -> &str {
            "access denied for user"
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some(self.0.into())
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    fn access_denied(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(AccessDenied(code)))
    }

    #[test]
    fn rejected_credentials_are_fatal() {
        for code in ["1045", "28000", "28P01"] {
            assert_eq!(
                classify_acquire(&access_denied(code)),
                AcquireFailure::Fatal("authentication rejected")
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_credentials_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_transient(Store::Payments, &PoolSettings::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(access_denied("1045")) }
        })
        .await;

        assert!(matches!(
            result,
            Err(QueryError::Connection {
                store: Store::Payments,
                reason: "authentication rejected"
            })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pool_timeout_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_transient(Store::Catalog, &PoolSettings::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(sqlx::Error::PoolTimedOut) }
        })
        .await;

        assert!(matches!(
            result,
            Err(QueryError::PoolExhausted { store: Store::Catalog })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_acquires_up_to_capacity_get_distinct_handles() {
        let dir = tempfile::tempdir().unwrap();
        let manager = sqlite_manager(&dir, small_pool());

        let (a, b) = tokio::join!(manager.acquire(Store::Catalog), manager.acquire(Store::Catalog));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.id(), b.id());
        assert_eq!(a.store(), Store::Catalog);
        assert_eq!(manager.stats(Store::Catalog).size, 2);
    }

    #[tokio::test]
    async fn acquire_beyond_capacity_fails_after_wait() {
        let dir = tempfile::tempdir().unwrap();
        let manager = sqlite_manager(&dir, small_pool());

        let _a = manager.acquire(Store::Catalog).await.unwrap();
        let _b = manager.acquire(Store::Catalog).await.unwrap();

        let started = Instant::now();
        let third = manager.acquire(Store::Catalog).await;

        assert!(matches!(
            third,
            Err(QueryError::PoolExhausted { store: Store::Catalog })
        ));
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn released_handle_unblocks_waiter() {
        let dir = tempfile::tempdir().unwrap();
        let manager = sqlite_manager(&dir, small_pool());

        let a = manager.acquire(Store::Catalog).await.unwrap();
        let _b = manager.acquire(Store::Catalog).await.unwrap();

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.acquire(Store::Catalog).await.map(|h| h.id()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        a.release();

        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn stores_have_independent_pools() {
        let dir = tempfile::tempdir().unwrap();
        let manager = sqlite_manager(&dir, small_pool());

        let _a = manager.acquire(Store::Catalog).await.unwrap();
        let _b = manager.acquire(Store::Catalog).await.unwrap();

        // Catalog is saturated; payments is unaffected
        let payments = manager.acquire(Store::Payments).await.unwrap();
        assert_eq!(payments.store(), Store::Payments);
    }

    #[tokio::test]
    async fn discarded_connection_leaves_the_pool() {
        let dir = tempfile::tempdir().unwrap();
        let manager = sqlite_manager(&dir, small_pool());

        let handle = manager.acquire(Store::Payments).await.unwrap();
        assert_eq!(manager.stats(Store::Payments).size, 1);
        handle.discard();

        for _ in 0..50 {
            if manager.stats(Store::Payments).size == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(manager.stats(Store::Payments).size, 0);
    }

    #[tokio::test]
    async fn zero_capacity_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = ConnectionConfig::sqlite(dir.path().join("catalog.db").display().to_string());
        let payments = ConnectionConfig::sqlite(dir.path().join("payments.db").display().to_string());
        let settings = PoolSettings {
            max_connections: 0,
            ..PoolSettings::default()
        };

        let result = ConnectionManager::new(&catalog, &payments, settings);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidPool { field: "max_connections" })
        ));
    }

    #[tokio::test]
    async fn unreachable_store_fails_without_blocking_startup() {
        let catalog = ConnectionConfig::mysql("127.0.0.1", "root", "unused", "myapp").with_port(1);
        let payments = ConnectionConfig::mysql("127.0.0.1", "root", "unused", "payments").with_port(1);
        let settings = PoolSettings {
            acquire_timeout_ms: 300,
            retry_backoff_ms: 10,
            ..PoolSettings::default()
        };

        // Construction succeeds even though nothing listens on port 1
        let manager = ConnectionManager::new(&catalog, &payments, settings).unwrap();

        let err = manager.acquire(Store::Catalog).await.err().unwrap();
        assert!(matches!(
            err,
            QueryError::Connection { .. } | QueryError::PoolExhausted { .. }
        ));
    }
}
