//! Backend neutral values and rows

use chrono::{DateTime, Utc};

use crate::error::{MigrateError, MigrateResult};

/// Value bound to a statement parameter or read from a result column
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
    /// A column of a type this crate does not decode, carrying the type name
    Unsupported(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

/// One result row: column names paired with their values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, builder style
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        self.columns.push((column.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Value of a column by name
    pub fn get(&self, column: &str) -> MigrateResult<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
            .ok_or_else(|| MigrateError::decode(column, "column not found"))
    }

    pub fn text(&self, column: &str) -> MigrateResult<&str> {
        match self.get(column)? {
            SqlValue::Text(value) => Ok(value.as_str()),
            other => Err(MigrateError::decode(column, format!("expected text, found {:?}", other))),
        }
    }

    pub fn integer(&self, column: &str) -> MigrateResult<i64> {
        match self.get(column)? {
            SqlValue::Integer(value) => Ok(*value),
            other => Err(MigrateError::decode(column, format!("expected integer, found {:?}", other))),
        }
    }

    pub fn timestamp(&self, column: &str) -> MigrateResult<DateTime<Utc>> {
        match self.get(column)? {
            SqlValue::Timestamp(value) => Ok(*value),
            other => Err(MigrateError::decode(column, format!("expected timestamp, found {:?}", other))),
        }
    }
}
