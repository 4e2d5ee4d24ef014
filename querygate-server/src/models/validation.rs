//! Validation error types

use std::fmt;

use crate::db::Store;

/// Validation failure, raised before a statement is ever compiled.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    Empty { field: &'static str },

    /// Field exceeds maximum length
    TooLong { field: &'static str, max: usize },

    /// Value doesn't have the expected shape (e.g. not an integer)
    InvalidFormat { field: &'static str, reason: &'static str },

    /// Table is not in the store's allow-list
    UnknownTable { store: Store, table: String },

    /// Column is not in the table's allow-list
    UnknownField { table: &'static str, field: String },

    /// Operator outside `=`, `LIKE`, `IN`
    UnsupportedOperator(String),

    /// UPDATE without a WHERE clause
    MissingPredicates,

    /// UPDATE without anything to SET
    MissingAssignments,

    /// SELECT carrying SET assignments
    UnexpectedAssignments,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::TooLong { field, max } => {
                write!(f, "{} exceeds maximum length of {} characters", field, max)
            }
            Self::InvalidFormat { field, reason } => write!(f, "{}: {}", field, reason),
            Self::UnknownTable { store, table } => {
                write!(f, "unknown table '{}' for {} store", table, store)
            }
            Self::UnknownField { table, field } => {
                write!(f, "unknown field '{}' on table '{}'", field, table)
            }
            Self::UnsupportedOperator(op) => {
                write!(f, "unsupported operator '{}', expected =, LIKE or IN", op)
            }
            Self::MissingPredicates => f.write_str("update requires at least one predicate"),
            Self::MissingAssignments => f.write_str("update requires at least one assignment"),
            Self::UnexpectedAssignments => f.write_str("select does not take assignments"),
        }
    }
}

impl std::error::Error for ValidationError {}
