use super::{Catalog, Table};
use crate::core::{Result, Row, StiError, TableSchema};
use crate::mapper::{QueryExecutor, RecordWriter, RowKey, SchemaSource};
use crate::query::Query;
use crate::record::Record;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};

/// Calls served by a [`MemoryStore`] since it was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub schema_lookups: usize,
    pub queries: usize,
    pub updates: usize,
    pub inserts: usize,
}

/// In-memory implementation of every mapper capability.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Metadata under its own lock; schema lookups never touch rows.
    catalog: RwLock<Catalog>,
    tables: RwLock<HashMap<String, Table>>,
    fail_updates: AtomicBool,
    schema_lookups: AtomicUsize,
    queries: AtomicUsize,
    updates: AtomicUsize,
    inserts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&self, schema: TableSchema) -> Result<()> {
        let mut catalog = self.catalog.write()?;
        let mut tables = self.tables.write()?;
        *catalog = catalog.clone().with_table(schema.clone())?;
        tables.insert(schema.name().to_string(), Table::new(schema));
        Ok(())
    }

    /// Inserts a raw row, bypassing any mapper logic.
    pub fn insert_row(&self, table: &str, row: Row) -> Result<Row> {
        let mut tables = self.tables.write()?;
        Self::table_mut(&mut tables, table)?.insert(row)
    }

    /// Every stored row of `table`, in insertion order.
    pub fn rows(&self, table: &str) -> Result<Vec<Row>> {
        let tables = self.tables.read()?;
        let table = tables
            .get(table)
            .ok_or_else(|| StiError::TableNotFound(table.to_string()))?;
        Ok(table.scan().cloned().collect())
    }

    /// Makes every following `persist_update` fail, for exercising write errors.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            schema_lookups: self.schema_lookups.load(AtomicOrdering::SeqCst),
            queries: self.queries.load(AtomicOrdering::SeqCst),
            updates: self.updates.load(AtomicOrdering::SeqCst),
            inserts: self.inserts.load(AtomicOrdering::SeqCst),
        }
    }

    fn table_mut<'a>(tables: &'a mut HashMap<String, Table>, name: &str) -> Result<&'a mut Table> {
        tables
            .get_mut(name)
            .ok_or_else(|| StiError::TableNotFound(name.to_string()))
    }
}

impl SchemaSource for MemoryStore {
    fn describe_table(&self, table: &str) -> Result<TableSchema> {
        self.schema_lookups.fetch_add(1, AtomicOrdering::SeqCst);
        let catalog = self.catalog.read()?;
        Ok(catalog.get_table(table)?.clone())
    }
}

impl QueryExecutor for MemoryStore {
    fn execute(&self, query: &Query) -> Result<Vec<Row>> {
        self.queries.fetch_add(1, AtomicOrdering::SeqCst);
        let tables = self.tables.read()?;
        let table = tables
            .get(query.table())
            .ok_or_else(|| StiError::TableNotFound(query.table().to_string()))?;

        let mut rows: Vec<Row> = table.scan().filter(|row| query.matches(row)).cloned().collect();
        if let Some(column) = query.order_column() {
            if !table.schema().has_column(column) {
                return Err(StiError::ColumnNotFound(
                    column.to_string(),
                    query.table().to_string(),
                ));
            }
            rows.sort_by(|a, b| {
                a.get(column)
                    .partial_cmp(&b.get(column))
                    .unwrap_or(Ordering::Equal)
            });
        }
        if let Some(limit) = query.limit_value() {
            rows.truncate(limit);
        }
        Ok(rows)
    }
}

impl RecordWriter for MemoryStore {
    fn persist_update(&self, table: &str, key: &RowKey, changes: &Row) -> Result<bool> {
        self.updates.fetch_add(1, AtomicOrdering::SeqCst);
        if self.fail_updates.load(AtomicOrdering::SeqCst) {
            return Err(StiError::ConstraintViolation(format!(
                "updates to '{}' are rejected",
                table
            )));
        }
        let mut tables = self.tables.write()?;
        Self::table_mut(&mut tables, table)?.update_where(&key.column, &key.value, changes)
    }

    fn persist_full_save(&self, table: &str, record: &Record) -> Result<Row> {
        self.inserts.fetch_add(1, AtomicOrdering::SeqCst);
        let mut tables = self.tables.write()?;
        Self::table_mut(&mut tables, table)?.insert(record.attributes().clone())
    }
}
