//! Per-store allow-lists of schema identifiers
//!
//! Table and column names cannot be bound as parameters, so they are
//! resolved against this closed set instead of being escaped. The builder
//! writes the `&'static str` from here into the template, never the caller's
//! string.

use super::Store;

/// A table and the columns that may appear in predicates or assignments.
#[derive(Debug)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

impl TableSchema {
    /// Resolve a column name to its allow-listed spelling.
    pub fn column(&self, name: &str) -> Option<&'static str> {
        self.columns.iter().copied().find(|c| *c == name)
    }
}

const CATALOG: &[TableSchema] = &[
    TableSchema {
        name: "users",
        columns: &["id", "name", "email"],
    },
    TableSchema {
        name: "products",
        columns: &["id", "name", "category", "price"],
    },
];

const PAYMENTS: &[TableSchema] = &[
    TableSchema {
        name: "invoices",
        columns: &["id", "user_id", "amount", "status"],
    },
    TableSchema {
        name: "payments",
        columns: &["id", "txn_id", "user_id", "amount", "status"],
    },
];

/// All tables known for a store.
pub fn tables(store: Store) -> &'static [TableSchema] {
    match store {
        Store::Catalog => CATALOG,
        Store::Payments => PAYMENTS,
    }
}

/// Look up a table by exact name within one store.
pub fn table(store: Store, name: &str) -> Option<&'static TableSchema> {
    tables(store).iter().find(|t| t.name == name)
}
