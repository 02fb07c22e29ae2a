//! Record mapper: loads, filters, stamps and converts records of one
//! single-table hierarchy.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use stimap::{Column, DataType, Hierarchy, MemoryStore, Record, RecordMapper, TableSchema};
//!
//! # fn main() -> stimap::Result<()> {
//! let hierarchy = Hierarchy::builder("animals", "Animal")
//!     .subtype("Dog", "Animal")
//!     .subtype("Cat", "Animal")
//!     .build()?;
//!
//! let store = Arc::new(MemoryStore::new());
//! store.create_table(TableSchema::new("animals", vec![
//!     Column::new("id", DataType::Integer).primary_key(),
//!     Column::new("type", DataType::Text),
//!     Column::new("name", DataType::Text),
//! ]))?;
//!
//! let mapper = RecordMapper::with_store(Arc::new(hierarchy), store);
//! let mut dog = Record::raw("Dog").with("name", "Fido");
//! mapper.save(&mut dog)?;
//!
//! let cat = mapper.becomes(dog, "Cat", true)?;
//! assert_eq!(cat.entity(), "Cat");
//! assert_eq!(mapper.all(mapper.find("Cat")?)?.len(), 1);
//! # Ok(())
//! # }
//! ```

mod becomes;
pub mod capabilities;

pub use capabilities::{QueryExecutor, RecordWriter, RowKey, SchemaSource};

use crate::core::{Result, Row, StiError, Value};
use crate::hierarchy::Hierarchy;
use crate::query::{Query, QueryKind, supports_sti};
use crate::record::Record;
use crate::validation::{AcceptAll, Validator};
use log::{debug, warn};
use std::sync::Arc;
use tracing::{Level, event, info_span};

#[derive(Clone)]
pub struct RecordMapper {
    hierarchy: Arc<Hierarchy>,
    schema: Arc<dyn SchemaSource>,
    executor: Arc<dyn QueryExecutor>,
    writer: Arc<dyn RecordWriter>,
    validator: Arc<dyn Validator>,
}

impl RecordMapper {
    pub fn new(
        hierarchy: Arc<Hierarchy>,
        schema: Arc<dyn SchemaSource>,
        executor: Arc<dyn QueryExecutor>,
        writer: Arc<dyn RecordWriter>,
        validator: Arc<dyn Validator>,
    ) -> Self {
        Self {
            hierarchy,
            schema,
            executor,
            writer,
            validator,
        }
    }

    /// Mapper over one store providing every I/O capability. Records are
    /// not validated until a validator is set with [`Self::with_validator`].
    pub fn with_store<S>(hierarchy: Arc<Hierarchy>, store: Arc<S>) -> Self
    where
        S: SchemaSource + QueryExecutor + RecordWriter + 'static,
    {
        Self::new(
            hierarchy,
            store.clone(),
            store.clone(),
            store,
            Arc::new(AcceptAll),
        )
    }

    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// Looks the discriminator column up in the physical schema.
    pub fn is_sti_column_present(&self) -> Result<bool> {
        let schema = self.schema.describe_table(self.hierarchy.table_name())?;
        let present = schema.has_column(self.hierarchy.column_name());
        if !present {
            debug!(
                "STI column '{}' is missing from table '{}'",
                self.hierarchy.column_name(),
                self.hierarchy.table_name()
            );
        }
        Ok(present)
    }

    pub fn is_sti_required(&self, entity: &str) -> Result<bool> {
        let schema = self.schema.describe_table(self.hierarchy.table_name())?;
        self.hierarchy.is_sti_required(entity, &schema)
    }

    /// Query for `entity` using the query kind configured for it.
    pub fn find(&self, entity: &str) -> Result<Query> {
        let kind = self.hierarchy.entity(entity)?.query_kind();
        self.find_with(entity, kind)
    }

    /// Query for `entity` using an explicit query kind.
    pub fn find_with(&self, entity: &str, kind: Arc<dyn QueryKind>) -> Result<Query> {
        let node = self.hierarchy.entity(entity)?;
        if !supports_sti(kind.as_ref()) {
            return Err(StiError::UnsupportedQueryType {
                entity: entity.to_string(),
                kind: kind.name().to_string(),
            });
        }

        let condition = self.hierarchy.sti_condition(entity)?;
        let enabled = node.is_sti_enabled() && self.is_sti_column_present()?;
        Ok(Query::new(
            entity,
            self.hierarchy.table_name(),
            kind,
            condition,
            enabled,
        ))
    }

    /// Prepares and runs `query`, dispatching every row to its concrete type.
    pub fn all(&self, mut query: Query) -> Result<Vec<Record>> {
        let span = info_span!("sti.find", entity = %query.entity(), kind = %query.kind().name());
        let _enter = span.enter();

        query.prepare();
        let rows = self.executor.execute(&query)?;
        event!(
            Level::DEBUG,
            condition = %query.where_clause(),
            rows = rows.len(),
            "query executed"
        );
        self.populate(query.entity(), rows)
    }

    pub fn one(&self, query: Query) -> Result<Option<Record>> {
        Ok(self.all(query.limit(1))?.into_iter().next())
    }

    pub fn find_by_key(&self, entity: &str, key: impl Into<Value>) -> Result<Option<Record>> {
        let query = self
            .find(entity)?
            .filter_eq(self.hierarchy.primary_key(), key);
        self.one(query)
    }

    /// Bare record of the type `row` belongs to, falling back to `declaring`
    /// when the row carries no usable discriminator value.
    pub fn instantiate(&self, declaring: &str, row: &Row) -> Result<Record> {
        let node = self.hierarchy.entity(declaring)?;
        if !node.is_sti_enabled() {
            return Ok(Record::raw(declaring));
        }

        match row.get(self.hierarchy.column_name()) {
            None | Some(Value::Null) => Ok(Record::raw(declaring)),
            Some(Value::Text(value)) => match self.hierarchy.resolve(value) {
                Some(resolved) => Ok(Record::raw(resolved.name())),
                None => {
                    warn!(
                        "Unknown discriminator value '{}' in table '{}', loading as '{}'",
                        value,
                        self.hierarchy.table_name(),
                        declaring
                    );
                    Ok(Record::raw(declaring))
                }
            },
            Some(other) => {
                warn!(
                    "Discriminator column holds {} instead of TEXT, loading as '{}'",
                    other.type_name(),
                    declaring
                );
                Ok(Record::raw(declaring))
            }
        }
    }

    /// Turns fetched rows into persisted records.
    ///
    /// Every load path goes through here, including rows fetched outside a
    /// [`Query`] such as eagerly loaded relations.
    pub fn populate(&self, declaring: &str, rows: Vec<Row>) -> Result<Vec<Record>> {
        rows.into_iter()
            .map(|row| {
                let mut record = self.instantiate(declaring, &row)?;
                record.load_row(row);
                Ok(record)
            })
            .collect()
    }

    /// Writes the discriminator of the record's own type into the record
    /// when the hierarchy requires it. Returns whether it did.
    pub fn stamp(&self, record: &mut Record) -> Result<bool> {
        if !self.is_sti_required(record.entity())? {
            return Ok(false);
        }
        let value = self.hierarchy.discriminator_value(record.entity(), None)?;
        record.set(self.hierarchy.column_name(), Value::from(value));
        Ok(true)
    }

    pub fn save(&self, record: &mut Record) -> Result<()> {
        self.save_inner(record, true)
    }

    pub fn save_without_validation(&self, record: &mut Record) -> Result<()> {
        self.save_inner(record, false)
    }

    fn save_inner(&self, record: &mut Record, validate: bool) -> Result<()> {
        let span = info_span!("sti.save", entity = %record.entity(), insert = record.is_new_record());
        let _enter = span.enter();

        self.stamp(record)?;
        if validate {
            self.validator
                .validate(record)
                .map_err(|errors| StiError::ValidationFailed {
                    entity: record.entity().to_string(),
                    errors,
                })?;
        }

        let table = self.hierarchy.table_name();
        if record.is_new_record() {
            let stored = self.writer.persist_full_save(table, record)?;
            record.load_row(stored);
            event!(Level::DEBUG, "record inserted");
            return Ok(());
        }

        let changed = record.dirty_attributes();
        if changed.is_empty() {
            return Ok(());
        }
        let key = self.row_key(record)?;
        let changes: Row = changed
            .into_iter()
            .map(|column| {
                let value = record.get(&column).cloned().unwrap_or(Value::Null);
                (column, value)
            })
            .collect();
        if !self.writer.persist_update(table, &key, &changes)? {
            return Err(StiError::RecordNotFound {
                table: table.to_string(),
                key: key.to_string(),
            });
        }
        record.mark_clean();
        event!(Level::DEBUG, columns = changes.len(), "record updated");
        Ok(())
    }

    /// Key of the row a persisted record was loaded from.
    fn row_key(&self, record: &Record) -> Result<RowKey> {
        let column = self.hierarchy.primary_key();
        record
            .old_attributes()
            .and_then(|snapshot| snapshot.get(column))
            .filter(|value| !value.is_null())
            .map(|value| RowKey::new(column, value.clone()))
            .ok_or_else(|| {
                StiError::ConstraintViolation(format!(
                    "'{}' record has no persisted '{}' value",
                    record.entity(),
                    column
                ))
            })
    }
}
