//! I/O capabilities the mapper delegates to.
//!
//! Each one is injected as an `Arc<dyn Trait>`, so the mapper runs against a
//! real database adapter or against [`MemoryStore`](crate::storage::MemoryStore).

use crate::core::{Result, Row, TableSchema, Value};
use crate::query::Query;
use crate::record::Record;
use std::fmt;

/// Primary key column and value identifying one stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowKey {
    pub column: String,
    pub value: Value,
}

impl RowKey {
    pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.column, self.value)
    }
}

pub trait SchemaSource: Send + Sync {
    fn describe_table(&self, table: &str) -> Result<TableSchema>;
}

pub trait QueryExecutor: Send + Sync {
    /// Runs a prepared query and returns the matching rows.
    fn execute(&self, query: &Query) -> Result<Vec<Row>>;
}

pub trait RecordWriter: Send + Sync {
    /// Writes `changes` to the row identified by `key`.
    /// Returns `false` when no row matched.
    fn persist_update(&self, table: &str, key: &RowKey, changes: &Row) -> Result<bool>;

    /// Inserts a new record and returns the row as stored, generated key included.
    fn persist_full_save(&self, table: &str, record: &Record) -> Result<Row>;
}
