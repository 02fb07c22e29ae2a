// ============================================================================
// stimap: single table inheritance mapper
// ============================================================================

//! Maps a hierarchy of record types onto one physical table, telling rows
//! apart by a discriminator column.
//!
//! Loading dispatches every row to the concrete type named by its
//! discriminator, queries for a subtype are narrowed to that subtype's rows,
//! saves stamp the record's own discriminator, and [`RecordMapper::becomes`]
//! converts a record into a sibling type in place.
//!
//! Storage is reached only through the [`SchemaSource`], [`QueryExecutor`]
//! and [`RecordWriter`] capabilities; [`MemoryStore`] implements all three.
//!
//! # Examples
//!
//! ```
//! use stimap::HierarchyConfig;
//!
//! # fn main() -> stimap::Result<()> {
//! let hierarchy = HierarchyConfig::from_json(r#"{
//!     "table": "animals",
//!     "root": "Animal",
//!     "types": [
//!         { "name": "Dog", "parent": "Animal" },
//!         { "name": "Cat", "parent": "Animal", "discriminator": "cat" }
//!     ]
//! }"#)?.build()?;
//!
//! assert_eq!(hierarchy.resolve("cat").map(|t| t.name()), Some("Cat"));
//! assert_eq!(hierarchy.discriminator_value("Animal", None)?, None);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod hierarchy;
pub mod mapper;
pub mod query;
pub mod record;
pub mod storage;
pub mod validation;

// Re-export main types for convenience
pub use crate::core::{BecomeError, Column, DataType, Result, Row, StiError, TableSchema, Value};
pub use crate::hierarchy::{EntityType, Hierarchy, HierarchyBuilder, HierarchyConfig};
pub use crate::mapper::{QueryExecutor, RecordMapper, RecordWriter, RowKey, SchemaSource};
pub use crate::query::{
    DescendantsQuery, PlainQuery, Predicate, Query, QueryKind, QueryKindName, StiQuery,
    supports_sti,
};
pub use crate::record::Record;
pub use crate::storage::{MemoryStore, StoreStats};
pub use crate::validation::{
    AcceptAll, Check, NotNull, OneOf, Required, RuleValidator, TypeOf, ValidationErrors,
    ValidationRule, Validator,
};
