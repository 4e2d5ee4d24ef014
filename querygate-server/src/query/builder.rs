//! Query Builder - compiles a [`QuerySpec`] into a [`PreparedStatement`]
//!
//! The template is assembled only from fixed keywords and allow-listed
//! identifiers. Every value becomes a positional `?` with the value carried
//! in `params`, in the same order.

use crate::db::{schema, Store};
use crate::models::ValidationError;

use super::spec::{Operation, Operator, QuerySpec, Value};

/// Template plus ordered bound parameters, tied to the store whose
/// allow-list validated it.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedStatement {
    store: Store,
    operation: Operation,
    sql: String,
    params: Vec<Value>,
}

impl PreparedStatement {
    pub fn store(&self) -> Store {
        self.store
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Number of `?` placeholders in the template.
    ///
    /// Identifiers come from the allow-list and never contain `?`, so a
    /// plain count is exact.
    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }

    #[cfg(test)]
    pub(crate) fn raw(store: Store, operation: Operation, sql: &str, params: Vec<Value>) -> Self {
        Self {
            store,
            operation,
            sql: sql.to_owned(),
            params,
        }
    }
}

/// Compile `spec` against `store`'s allow-list.
///
/// # Errors
///
/// [`ValidationError`] when the table or any field is unknown to the store,
/// or the statement shape is invalid (UPDATE without SET or WHERE, SELECT
/// with SET).
///
/// # Example
///
/// ```
/// use querygate_server::db::Store;
/// use querygate_server::query::{build, Operator, QuerySpec};
///
/// let spec = QuerySpec::select("users").filter("id", Operator::Eq, "1 OR 1=1");
/// let statement = build(Store::Catalog, spec).unwrap();
/// assert_eq!(statement.sql(), "SELECT * FROM users WHERE id = ?");
/// assert_eq!(statement.params().len(), 1);
/// ```
pub fn build(store: Store, spec: QuerySpec) -> Result<PreparedStatement, ValidationError> {
    let table = schema::table(store, &spec.table).ok_or_else(|| ValidationError::UnknownTable {
        store,
        table: spec.table.clone(),
    })?;

    let column = |field: &str| {
        table.column(field).ok_or_else(|| ValidationError::UnknownField {
            table: table.name,
            field: field.to_owned(),
        })
    };

    let mut sql = String::with_capacity(64);
    let mut params = Vec::with_capacity(spec.assignments.len() + spec.predicates.len());

    match spec.operation {
        Operation::Select => {
            if !spec.assignments.is_empty() {
                return Err(ValidationError::UnexpectedAssignments);
            }
            sql.push_str("SELECT * FROM ");
            sql.push_str(table.name);
        }
        Operation::Update => {
            if spec.assignments.is_empty() {
                return Err(ValidationError::MissingAssignments);
            }
            if spec.predicates.is_empty() {
                return Err(ValidationError::MissingPredicates);
            }

            sql.push_str("UPDATE ");
            sql.push_str(table.name);
            sql.push_str(" SET ");
            for (i, assignment) in spec.assignments.into_iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(column(&assignment.field)?);
                sql.push_str(" = ?");
                params.push(assignment.value);
            }
        }
    }

    for (i, predicate) in spec.predicates.into_iter().enumerate() {
        sql.push_str(if i == 0 { " WHERE " } else { " AND " });
        sql.push_str(column(&predicate.field)?);
        sql.push_str(match predicate.operator {
            Operator::Eq => " = ?",
            Operator::Like => " LIKE ?",
            Operator::In => " IN (?)",
        });
        params.push(predicate.value);
    }

    tracing::debug!(store = %store, sql = %sql, params = params.len(), "statement compiled");

    Ok(PreparedStatement {
        store,
        operation: spec.operation,
        sql,
        params,
    })
}
