//! Query Executor - runs a [`PreparedStatement`] on a pooled connection
//!
//! 1. Acquire a handle for the statement's store (released on every path)
//! 2. Bind each parameter and run the template unchanged
//! 3. Map rows or affected counts into [`QueryResult`]
//! 4. Classify failures; discard the connection after a timeout or a
//!    connection-level fault

use std::time::Duration;

use sqlx::mysql::MySql;
use sqlx::query::Query;
use sqlx::sqlite::Sqlite;
use sqlx::{Database, Encode, Type};

use super::builder::PreparedStatement;
use super::result::{mysql_record, sqlite_record, QueryResult, Record};
use super::spec::{Operation, Value};
use crate::db::pool::StoreConnection;
use crate::db::ConnectionManager;
use crate::error::{is_connection_fault, QueryError};

/// Runs compiled statements through the [`ConnectionManager`].
#[derive(Clone)]
pub struct Executor {
    manager: ConnectionManager,
    statement_timeout: Duration,
}

impl Executor {
    pub fn new(manager: ConnectionManager) -> Self {
        let statement_timeout = manager.settings().statement_timeout();
        Self {
            manager,
            statement_timeout,
        }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Execute `statement` against the store it was compiled for.
    pub async fn execute(&self, statement: &PreparedStatement) -> Result<QueryResult, QueryError> {
        let store = statement.store();
        let mut handle = self.manager.acquire(store).await?;

        let outcome = tokio::time::timeout(
            self.statement_timeout,
            run(handle.connection(), statement),
        )
        .await;

        match outcome {
            Ok(Ok(result)) => {
                handle.release();
                Ok(result)
            }
            Ok(Err(err)) => {
                // Raw diagnostics stay in the log
                tracing::error!(
                    store = %store,
                    handle = handle.id(),
                    sql = statement.sql(),
                    error = %err,
                    "statement failed"
                );
                if is_connection_fault(&err) {
                    handle.discard();
                } else {
                    handle.release();
                }
                Err(QueryError::from_execution(&err))
            }
            Err(_) => {
                tracing::warn!(
                    store = %store,
                    handle = handle.id(),
                    timeout_ms = self.statement_timeout.as_millis() as u64,
                    "statement timed out"
                );
                handle.discard();
                Err(QueryError::Timeout(self.statement_timeout))
            }
        }
    }
}

async fn run(conn: &mut StoreConnection, statement: &PreparedStatement) -> Result<QueryResult, sqlx::Error> {
    match conn {
        StoreConnection::Mysql(conn) => {
            let query = bind_params(sqlx::query::<MySql>(statement.sql()), statement.params());
            match statement.operation() {
                Operation::Select => collect_rows(query.fetch_all(&mut **conn).await?, mysql_record),
                Operation::Update => {
                    let done = query.execute(&mut **conn).await?;
                    Ok(QueryResult::Affected(done.rows_affected()))
                }
            }
        }
        StoreConnection::Sqlite(conn) => {
            let query = bind_params(sqlx::query::<Sqlite>(statement.sql()), statement.params());
            match statement.operation() {
                Operation::Select => collect_rows(query.fetch_all(&mut **conn).await?, sqlite_record),
                Operation::Update => {
                    let done = query.execute(&mut **conn).await?;
                    Ok(QueryResult::Affected(done.rows_affected()))
                }
            }
        }
    }
}

/// Bind every parameter in order, keeping its type.
fn bind_params<'q, DB>(
    mut query: Query<'q, DB, <DB as Database>::Arguments<'q>>,
    params: &'q [Value],
) -> Query<'q, DB, <DB as Database>::Arguments<'q>>
where
    DB: Database,
    i64: Encode<'q, DB> + Type<DB>,
    f64: Encode<'q, DB> + Type<DB>,
    &'q str: Encode<'q, DB> + Type<DB>,
{
    for value in params {
        query = match value {
            Value::Integer(v) => query.bind(*v),
            Value::Real(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.as_str()),
        };
    }
    query
}

fn collect_rows<R>(
    rows: Vec<R>,
    decode: fn(&R) -> Result<Record, sqlx::Error>,
) -> Result<QueryResult, sqlx::Error> {
    rows.iter()
        .map(decode)
        .collect::<Result<Vec<_>, _>>()
        .map(QueryResult::Rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ConnectionConfig, PoolSettings, Store};
    use crate::query::{build, Operator, QuerySpec};

    async fn seeded(dir: &tempfile::TempDir, settings: PoolSettings) -> Executor {
        let catalog = ConnectionConfig::sqlite(dir.path().join("catalog.db").display().to_string());
        let payments = ConnectionConfig::sqlite(dir.path().join("payments.db").display().to_string());
        let manager = ConnectionManager::new(&catalog, &payments, settings).unwrap();

        let mut handle = manager.acquire(Store::Catalog).await.unwrap();
        let StoreConnection::Sqlite(conn) = handle.connection() else {
            panic!("catalog should be a sqlite store");
        };
        for sql in [
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT UNIQUE)",
            "INSERT INTO users (id, name, email) VALUES (1, 'ada', 'ada@example.com')",
            "INSERT INTO users (id, name, email) VALUES (2, 'grace', NULL)",
        ] {
            sqlx::query(sql).execute(&mut **conn).await.unwrap();
        }
        handle.release();

        Executor::new(manager)
    }

    #[tokio::test]
    async fn select_returns_ordered_records() {
        let dir = tempfile::tempdir().unwrap();
        let executor = seeded(&dir, PoolSettings::default()).await;

        let statement = build(
            Store::Catalog,
            QuerySpec::select("users").filter("id", Operator::Eq, 1_i64),
        )
        .unwrap();
        let rows = executor.execute(&statement).await.unwrap().into_rows().unwrap();

        assert_eq!(rows.len(), 1);
        let keys: Vec<_> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, ["id", "name", "email"]);
        assert_eq!(rows[0]["name"], "ada");
        assert_eq!(rows[0]["id"], 1);
    }

    #[tokio::test]
    async fn null_columns_decode_as_null() {
        let dir = tempfile::tempdir().unwrap();
        let executor = seeded(&dir, PoolSettings::default()).await;

        let statement = build(
            Store::Catalog,
            QuerySpec::select("users").filter("name", Operator::Eq, "grace"),
        )
        .unwrap();
        let rows = executor.execute(&statement).await.unwrap().into_rows().unwrap();
        assert_eq!(rows[0]["email"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn constraint_violation_is_classified_and_connection_reused() {
        let dir = tempfile::tempdir().unwrap();
        let executor = seeded(&dir, PoolSettings::default()).await;

        let statement = build(
            Store::Catalog,
            QuerySpec::update("users")
                .set("email", "ada@example.com")
                .filter("id", Operator::Eq, 2_i64),
        )
        .unwrap();

        let err = executor.execute(&statement).await.unwrap_err();
        assert!(matches!(err, QueryError::Constraint));

        // The failed write left nothing behind
        let check = build(
            Store::Catalog,
            QuerySpec::select("users").filter("id", Operator::Eq, 2_i64),
        )
        .unwrap();
        let rows = executor.execute(&check).await.unwrap().into_rows().unwrap();
        assert_eq!(rows[0]["email"], serde_json::Value::Null);
        assert_eq!(executor.manager().stats(Store::Catalog).size, 1);
    }

    #[tokio::test]
    async fn sqlite_storage_classes_decode_to_json() {
        let dir = tempfile::tempdir().unwrap();
        let executor = seeded(&dir, PoolSettings::default()).await;

        let mut handle = executor.manager().acquire(Store::Catalog).await.unwrap();
        let StoreConnection::Sqlite(conn) = handle.connection() else {
            panic!("catalog should be a sqlite store");
        };
        for sql in [
            "CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT, category BLOB, price NUMERIC)",
            "INSERT INTO products VALUES (7, 'lamp', X'0102', 19.5)",
        ] {
            sqlx::query(sql).execute(&mut **conn).await.unwrap();
        }
        handle.release();

        let statement = build(
            Store::Catalog,
            QuerySpec::select("products").filter("name", Operator::Eq, "lamp"),
        )
        .unwrap();
        let rows = executor.execute(&statement).await.unwrap().into_rows().unwrap();

        assert_eq!(
            serde_json::Value::Object(rows[0].clone()),
            serde_json::json!({ "id": 7, "name": "lamp", "category": [1, 2], "price": 19.5 })
        );
    }

    // Run with: QUERYGATE_TEST_MYSQL_{HOST,USER,PASSWORD,DATABASE} set,
    // then `cargo test -p querygate-server -- --ignored`
    #[tokio::test]
    #[ignore = "requires database"]
    async fn mysql_column_types_decode_to_json() {
        let var = |name: &str| std::env::var(name).expect("QUERYGATE_TEST_MYSQL_* required");
        let mysql = ConnectionConfig::mysql(
            var("QUERYGATE_TEST_MYSQL_HOST"),
            var("QUERYGATE_TEST_MYSQL_USER"),
            var("QUERYGATE_TEST_MYSQL_PASSWORD"),
            var("QUERYGATE_TEST_MYSQL_DATABASE"),
        );
        let manager = ConnectionManager::new(&mysql, &mysql, PoolSettings::default()).unwrap();

        let mut handle = manager.acquire(Store::Payments).await.unwrap();
        let StoreConnection::Mysql(conn) = handle.connection() else {
            panic!("payments should be a mysql store");
        };
        for sql in [
            "DROP TABLE IF EXISTS invoices",
            "CREATE TABLE invoices (id INT PRIMARY KEY, user_id BIGINT UNSIGNED, \
             amount DECIMAL(10,2), status ENUM('open','paid'), paid TINYINT(1), \
             issued DATE, created_at TIMESTAMP NULL, updated_at DATETIME)",
            "INSERT INTO invoices VALUES (1, 10, 149.90, 'paid', 1, '2024-03-01', \
             NULL, '2024-03-02 10:30:00')",
        ] {
            sqlx::query(sql).execute(&mut **conn).await.unwrap();
        }
        handle.release();

        let executor = Executor::new(manager);
        let statement = build(
            Store::Payments,
            QuerySpec::select("invoices").filter("user_id", Operator::Eq, 10_i64),
        )
        .unwrap();
        let rows = executor.execute(&statement).await.unwrap().into_rows().unwrap();

        assert_eq!(rows[0]["amount"], "149.90");
        assert_eq!(rows[0]["status"], "paid");
        assert_eq!(rows[0]["paid"], true);
        assert_eq!(rows[0]["issued"], "2024-03-01");
        assert_eq!(rows[0]["created_at"], serde_json::Value::Null);
        assert_eq!(rows[0]["updated_at"], "2024-03-02 10:30:00");
    }

    #[tokio::test]
    async fn missing_table_maps_to_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let executor = seeded(&dir, PoolSettings::default()).await;

        // Allow-listed, but never created in this store
        let statement = build(Store::Catalog, QuerySpec::select("products")).unwrap();
        let err = executor.execute(&statement).await.unwrap_err();
        assert!(matches!(err, QueryError::Unknown));
        assert_eq!(err.to_string(), "statement failed");
    }

    #[tokio::test]
    async fn slow_statement_times_out_and_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PoolSettings {
            statement_timeout_ms: 1,
            ..PoolSettings::default()
        };
        let executor = seeded(&dir, settings).await;

        let statement = PreparedStatement::raw(
            Store::Catalog,
            Operation::Select,
            "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < ?) \
             SELECT count(*) AS n FROM c",
            vec![Value::Integer(5_000_000)],
        );

        let err = executor.execute(&statement).await.unwrap_err();
        assert!(matches!(err, QueryError::Timeout(_)));
    }
}
