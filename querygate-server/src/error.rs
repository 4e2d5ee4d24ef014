//! Error taxonomy for the query path
//!
//! Driver errors are classified here and never surface verbatim: callers see
//! the variant and its safe message, the raw diagnostic goes to the log.

use std::time::Duration;

use sqlx::error::ErrorKind;
use thiserror::Error;

use crate::db::Store;
use crate::models::ValidationError;

/// Classified failure of a query request.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Rejected before compilation
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Store unreachable, misconfigured, or refused our credentials
    #[error("{store} store unavailable: {reason}")]
    Connection { store: Store, reason: &'static str },

    /// No connection freed up within the acquire timeout
    #[error("{store} store is at capacity, try again later")]
    PoolExhausted { store: Store },

    /// Unique, foreign key, not-null, or check constraint
    #[error("request conflicts with existing data")]
    Constraint,

    #[error("record not found")]
    NotFound,

    #[error("statement timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("statement failed")]
    Unknown,
}

impl QueryError {
    /// Classify a failure raised while running a statement.
    pub(crate) fn from_execution(err: &sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => {
                let constraint = matches!(
                    db.kind(),
                    ErrorKind::UniqueViolation
                        | ErrorKind::ForeignKeyViolation
                        | ErrorKind::NotNullViolation
                        | ErrorKind::CheckViolation
                );
                // SQLSTATE class 23: integrity constraint violation
                let integrity_class = db.code().is_some_and(|code| code.starts_with("23"));

                if constraint || integrity_class {
                    Self::Constraint
                } else {
                    Self::Unknown
                }
            }
            sqlx::Error::RowNotFound => Self::NotFound,
            _ => Self::Unknown,
        }
    }
}

/// Whether an execution error leaves the connection in an untrusted state.
pub(crate) fn is_connection_fault(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::WorkerCrashed
    )
}

/// SQLSTATE / vendor codes for rejected credentials.
pub(crate) fn is_auth_failure(code: Option<&str>) -> bool {
    // 28000: invalid authorization (MySQL, SQL standard)
    // 28P01: invalid password (PostgreSQL-compatible proxies)
    // 1045: MySQL ER_ACCESS_DENIED_ERROR
    matches!(code, Some("28000" | "28P01" | "1045"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            QueryError::from_execution(&sqlx::Error::RowNotFound),
            QueryError::NotFound
        ));
    }

    #[test]
    fn unclassified_errors_are_unknown() {
        let err = sqlx::Error::Protocol("unexpected packet".into());
        assert!(matches!(QueryError::from_execution(&err), QueryError::Unknown));
        assert!(is_connection_fault(&err));

        let err = sqlx::Error::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert!(is_connection_fault(&err));

        assert!(!is_connection_fault(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn auth_codes() {
        assert!(is_auth_failure(Some("28000")));
        assert!(is_auth_failure(Some("1045")));
        assert!(!is_auth_failure(Some("23000")));
        assert!(!is_auth_failure(None));
    }

    #[test]
    fn messages_do_not_carry_driver_text() {
        let err = QueryError::Connection {
            store: Store::Payments,
            reason: "authentication rejected",
        };
        assert_eq!(
            err.to_string(),
            "payments store unavailable: authentication rejected"
        );
        assert_eq!(
            QueryError::Timeout(Duration::from_millis(250)).to_string(),
            "statement timed out after 250ms"
        );
    }
}
