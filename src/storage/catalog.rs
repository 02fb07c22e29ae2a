use crate::core::{Result, StiError, TableSchema};
use std::collections::HashMap;
use std::sync::Arc;

/// Table metadata only. Immutable once built, so clones are cheap and
/// readers never wait on row locks.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: Arc<HashMap<String, TableSchema>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new catalog with `schema` added (copy-on-write).
    pub fn with_table(self, schema: TableSchema) -> Result<Self> {
        let name = schema.name().to_string();
        if self.tables.contains_key(&name) {
            return Err(StiError::TableExists(name));
        }

        let mut tables = (*self.tables).clone();
        tables.insert(name, schema);
        Ok(Self {
            tables: Arc::new(tables),
        })
    }

    pub fn get_table(&self, name: &str) -> Result<&TableSchema> {
        self.tables
            .get(name)
            .ok_or_else(|| StiError::TableNotFound(name.to_string()))
    }
}
