//! Statement and row types exchanged with the relational backing store.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;

use super::data::DataError;

/// Error type for store operations. Carries the statement intent, never its text.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The driver error stays reachable through `source()` only; its text can
    /// echo bound values.
    #[error("Statement '{intent}' failed")]
    Query {
        intent: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A value bound to a positional placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Timestamp(DateTime<Utc>),
    IntArray(Vec<i64>),
}

/// Physical type of a projected column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int,
    Float,
    Text,
    TextArray,
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A fully parameterized read statement
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// What the statement is for; safe to log
    pub intent: &'static str,
    pub sql: String,
    pub params: Vec<SqlParam>,
    /// Output columns, in projection order
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    TextArray(Vec<String>),
    Timestamp(DateTime<Utc>),
}

impl ColumnValue {
    fn type_name(&self) -> &'static str {
        match self {
            ColumnValue::Null => "null",
            ColumnValue::Int(_) => "int",
            ColumnValue::Float(_) => "float",
            ColumnValue::Text(_) => "text",
            ColumnValue::TextArray(_) => "text[]",
            ColumnValue::Timestamp(_) => "timestamp",
        }
    }
}

/// One result row, keyed by output column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: HashMap<String, ColumnValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: ColumnValue) {
        self.values.insert(column.into(), value);
    }

    pub fn with(mut self, column: impl Into<String>, value: ColumnValue) -> Self {
        self.insert(column, value);
        self
    }

    fn get(&self, column: &str) -> Result<&ColumnValue, DataError> {
        self.values
            .get(column)
            .ok_or_else(|| DataError::MissingColumn(column.to_string()))
    }

    fn unexpected(column: &str, expected: &'static str, actual: &ColumnValue) -> DataError {
        DataError::UnexpectedType {
            column: column.to_string(),
            expected,
            actual: actual.type_name(),
        }
    }

    pub fn int(&self, column: &str) -> Result<i64, DataError> {
        match self.get(column)? {
            ColumnValue::Int(v) => Ok(*v),
            other => Err(Self::unexpected(column, "int", other)),
        }
    }

    pub fn float(&self, column: &str) -> Result<f64, DataError> {
        match self.get(column)? {
            ColumnValue::Float(v) => Ok(*v),
            other => Err(Self::unexpected(column, "float", other)),
        }
    }

    pub fn text(&self, column: &str) -> Result<&str, DataError> {
        match self.get(column)? {
            ColumnValue::Text(v) => Ok(v),
            ColumnValue::Null => Err(DataError::NullValue(column.to_string())),
            other => Err(Self::unexpected(column, "text", other)),
        }
    }

    /// A NULL array is read as empty
    pub fn text_array(&self, column: &str) -> Result<&[String], DataError> {
        match self.get(column)? {
            ColumnValue::TextArray(v) => Ok(v),
            ColumnValue::Null => Ok(&[]),
            other => Err(Self::unexpected(column, "text[]", other)),
        }
    }

    pub fn timestamp(&self, column: &str) -> Result<DateTime<Utc>, DataError> {
        match self.get(column)? {
            ColumnValue::Timestamp(v) => Ok(*v),
            other => Err(Self::unexpected(column, "timestamp", other)),
        }
    }
}

/// Anything that can run a read statement and hand back all of its rows
pub trait RowSource {
    fn fetch(&self, statement: &Statement) -> impl Future<Output = StoreResult<Vec<Row>>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_accessors() {
        let row = Row::new()
            .with("id", ColumnValue::Int(7))
            .with("platform", ColumnValue::Text("06260".to_string()))
            .with("link_href", ColumnValue::Null)
            .with("unit", ColumnValue::Null);

        assert_eq!(row.int("id").unwrap(), 7);
        assert_eq!(row.text("platform").unwrap(), "06260");
        assert!(row.text_array("link_href").unwrap().is_empty());
        assert!(matches!(row.text("unit"), Err(DataError::NullValue(_))));
        assert!(matches!(row.text("missing"), Err(DataError::MissingColumn(_))));
        assert!(matches!(
            row.text("id"),
            Err(DataError::UnexpectedType { expected: "text", actual: "int", .. })
        ));
    }

    #[test]
    fn test_store_error_hides_driver_text() {
        let err = StoreError::Query {
            intent: "get observations",
            source: sqlx::Error::Protocol("invalid input syntax for type integer: \"06260\"".to_string()),
        };
        assert_eq!(err.to_string(), "Statement 'get observations' failed");
        assert!(std::error::Error::source(&err).is_some());
    }
}
