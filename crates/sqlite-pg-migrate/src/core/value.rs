//! SQL value types for row transfer.
//!
//! Source rows arrive as one of SQLite's storage classes (`Null`, `I64`,
//! `F64`, `Text`, `Bytes`). Sanitization may turn them into any variant.

use chrono::{DateTime, Utc};

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL.
    Null,

    /// Boolean value.
    Bool(bool),

    /// 64-bit signed integer.
    I64(i64),

    /// 64-bit floating point.
    F64(f64),

    /// Text data.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// Exact decimal kept in its textual form so no precision is lost.
    Decimal(String),

    /// Timestamp in UTC.
    DateTime(DateTime<Utc>),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Check if this value is a string containing only whitespace.
    #[must_use]
    pub fn is_blank_text(&self) -> bool {
        matches!(self, SqlValue::Text(s) if s.trim().is_empty())
    }
}

// From implementations for common types
impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I64(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::DateTime(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One row of cell values in column order.
pub type Row = Vec<SqlValue>;

/// A page of rows read from the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Rows in this page.
    pub rows: Vec<Row>,

    /// Offset of the first row within the table.
    pub offset: u64,
}

impl Batch {
    /// Create a new batch starting at `offset`.
    pub fn new(rows: Vec<Row>, offset: u64) -> Self {
        Self { rows, offset }
    }

    /// Get the number of rows in this batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
