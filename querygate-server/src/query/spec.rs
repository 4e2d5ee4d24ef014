//! Query specifications
//!
//! A [`QuerySpec`] names the table and columns it touches as plain strings;
//! nothing here is trusted until [`build`](super::build) resolves them
//! against the store's allow-list.

use std::fmt;
use std::str::FromStr;

use crate::models::ValidationError;

/// Statement kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    Update,
}

/// Predicate comparison. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Like,
    In,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Like => "LIKE",
            Self::In => "IN",
        }
    }
}

impl FromStr for Operator {
    type Err = ValidationError;

    /// Parse `=`, `LIKE` or `IN` (keywords case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "=" {
            Ok(Self::Eq)
        } else if s.eq_ignore_ascii_case("LIKE") {
            Ok(Self::Like)
        } else if s.eq_ignore_ascii_case("IN") {
            Ok(Self::In)
        } else {
            Err(ValidationError::UnsupportedOperator(s.to_owned()))
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Untrusted value, bound as a parameter with its type preserved.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

/// `field <operator> value`
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

/// `field = value` in an UPDATE's SET clause
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub field: String,
    pub value: Value,
}

/// Structured description of one single-statement operation.
///
/// # Example
/// ```
/// use querygate_server::query::{Operator, QuerySpec};
///
/// let spec = QuerySpec::update("payments")
///     .set("status", "refunded")
///     .filter("txn_id", Operator::Eq, "abc123");
/// assert_eq!(spec.predicates.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub operation: Operation,
    pub table: String,
    /// Applied left to right, joined with AND
    pub predicates: Vec<Predicate>,
    /// UPDATE only
    pub assignments: Vec<Assignment>,
}

impl QuerySpec {
    pub fn select(table: impl Into<String>) -> Self {
        Self::new(Operation::Select, table)
    }

    pub fn update(table: impl Into<String>) -> Self {
        Self::new(Operation::Update, table)
    }

    fn new(operation: Operation, table: impl Into<String>) -> Self {
        Self {
            operation,
            table: table.into(),
            predicates: Vec::new(),
            assignments: Vec::new(),
        }
    }

    /// Append a predicate.
    pub fn filter(mut self, field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate {
            field: field.into(),
            operator,
            value: value.into(),
        });
        self
    }

    /// Append a SET assignment.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push(Assignment {
            field: field.into(),
            value: value.into(),
        });
        self
    }
}
