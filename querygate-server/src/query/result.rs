//! Query results and row decoding

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Value as JsonValue};
use sqlx::mysql::MySqlRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// One row, keyed by column name in select order.
pub type Record = Map<String, JsonValue>;

/// Outcome of a successful statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Ordered records from a read
    Rows(Vec<Record>),
    /// Rows affected by a write
    Affected(u64),
}

impl QueryResult {
    pub fn into_rows(self) -> Option<Vec<Record>> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::Affected(_) => None,
        }
    }

    pub fn affected(&self) -> Option<u64> {
        match self {
            Self::Affected(n) => Some(*n),
            Self::Rows(_) => None,
        }
    }
}

pub(crate) fn mysql_record(row: &MySqlRow) -> Result<Record, sqlx::Error> {
    let mut record = Record::new();
    for column in row.columns() {
        let index = column.ordinal();
        let value = if row.try_get_raw(index)?.is_null() {
            JsonValue::Null
        } else {
            decode_mysql(row, index, MySqlKind::of(column.type_info().name()))?
        };
        record.insert(column.name().to_owned(), value);
    }
    Ok(record)
}

/// How a MySQL column is rendered as JSON, by its reported type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MySqlKind {
    Bool,
    Signed,
    Unsigned,
    Float,
    /// Exact numerics stay text so no digits are lost
    Decimal,
    Date,
    Time,
    DateTime,
    Timestamp,
    Json,
    Text,
    Bytes,
}

impl MySqlKind {
    fn of(type_name: &str) -> Self {
        match type_name {
            "BOOLEAN" => Self::Bool,
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => Self::Signed,
            "YEAR" | "BIT" => Self::Unsigned,
            name if name.ends_with(" UNSIGNED") => Self::Unsigned,
            "FLOAT" | "DOUBLE" => Self::Float,
            "DECIMAL" => Self::Decimal,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "DATETIME" => Self::DateTime,
            "TIMESTAMP" => Self::Timestamp,
            "JSON" => Self::Json,
            "CHAR" | "VARCHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
                Self::Text
            }
            _ => Self::Bytes,
        }
    }
}

fn decode_mysql(row: &MySqlRow, index: usize, kind: MySqlKind) -> Result<JsonValue, sqlx::Error> {
    Ok(match kind {
        MySqlKind::Bool => row.try_get::<bool, _>(index)?.into(),
        MySqlKind::Signed => row.try_get::<i64, _>(index)?.into(),
        // YEAR and BIT carry no UNSIGNED flag, so skip the type check
        MySqlKind::Unsigned => row.try_get_unchecked::<u64, _>(index)?.into(),
        MySqlKind::Float => row.try_get::<f64, _>(index)?.into(),
        MySqlKind::Decimal | MySqlKind::Text => row.try_get_unchecked::<String, _>(index)?.into(),
        MySqlKind::Date => row.try_get::<NaiveDate, _>(index)?.to_string().into(),
        MySqlKind::Time => row.try_get::<NaiveTime, _>(index)?.to_string().into(),
        MySqlKind::DateTime => row.try_get::<NaiveDateTime, _>(index)?.to_string().into(),
        MySqlKind::Timestamp => row.try_get::<DateTime<Utc>, _>(index)?.to_rfc3339().into(),
        MySqlKind::Json => row.try_get::<JsonValue, _>(index)?,
        MySqlKind::Bytes => row.try_get_unchecked::<Vec<u8>, _>(index)?.into(),
    })
}

pub(crate) fn sqlite_record(row: &SqliteRow) -> Result<Record, sqlx::Error> {
    let mut record = Record::new();
    for column in row.columns() {
        let value = decode_sqlite(row, column.ordinal())?;
        record.insert(column.name().to_owned(), value);
    }
    Ok(record)
}

/// Decode by the value's storage class, which SQLite reports per value.
fn decode_sqlite(row: &SqliteRow, index: usize) -> Result<JsonValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(JsonValue::Null);
    }

    let storage = raw.type_info();
    Ok(match storage.name() {
        "INTEGER" | "BOOLEAN" => row.try_get_unchecked::<i64, _>(index)?.into(),
        "REAL" => row.try_get_unchecked::<f64, _>(index)?.into(),
        "BLOB" => row.try_get_unchecked::<Vec<u8>, _>(index)?.into(),
        _ => row.try_get_unchecked::<String, _>(index)?.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_accessors() {
        assert_eq!(QueryResult::Affected(1).affected(), Some(1));
        assert_eq!(QueryResult::Affected(1).into_rows(), None);
        assert_eq!(QueryResult::Rows(vec![]).into_rows(), Some(vec![]));
        assert_eq!(QueryResult::Rows(vec![]).affected(), None);
    }

    #[test]
    fn mysql_columns_map_to_json_kinds() {
        let cases = [
            ("BOOLEAN", MySqlKind::Bool),
            ("TINYINT", MySqlKind::Signed),
            ("INT", MySqlKind::Signed),
            ("MEDIUMINT", MySqlKind::Signed),
            ("BIGINT UNSIGNED", MySqlKind::Unsigned),
            ("YEAR", MySqlKind::Unsigned),
            ("DOUBLE", MySqlKind::Float),
            ("DECIMAL", MySqlKind::Decimal),
            ("DATE", MySqlKind::Date),
            ("DATETIME", MySqlKind::DateTime),
            ("TIMESTAMP", MySqlKind::Timestamp),
            ("TIME", MySqlKind::Time),
            ("JSON", MySqlKind::Json),
            ("ENUM", MySqlKind::Text),
            ("SET", MySqlKind::Text),
            ("VARCHAR", MySqlKind::Text),
            ("LONGTEXT", MySqlKind::Text),
            ("VARBINARY", MySqlKind::Bytes),
            ("GEOMETRY", MySqlKind::Bytes),
        ];

        for (name, kind) in cases {
            assert_eq!(MySqlKind::of(name), kind, "{}", name);
        }
    }
}
