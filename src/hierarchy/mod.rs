//! Discriminator resolution for one single-table hierarchy.
//!
//! A [`Hierarchy`] is an explicit tree built once from a
//! [`HierarchyConfig`] or a [`HierarchyBuilder`]. Every decision it makes is a
//! pure function of that tree and the table schema handed in.

pub mod config;

pub use config::{EntityTypeConfig, HierarchyBuilder, HierarchyConfig};

use crate::core::{Result, StiError, TableSchema};
use crate::query::{ColumnRef, QueryKind, StiCondition};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub const DEFAULT_STI_COLUMN: &str = "type";
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Resolved node of the hierarchy tree.
#[derive(Debug, Clone)]
pub struct EntityType {
    name: String,
    short_name: String,
    parent: Option<String>,
    children: Vec<String>,
    discriminator: Option<String>,
    is_root: bool,
    sti_enabled: bool,
    query_kind: Arc<dyn QueryKind>,
}

impl EntityType {
    /// Fully qualified name, e.g. `zoo::Dog`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unqualified name, e.g. `Dog`.
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn children(&self) -> &[String] {
        &self.children
    }

    pub fn discriminator(&self) -> Option<&str> {
        self.discriminator.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn is_sti_enabled(&self) -> bool {
        self.sti_enabled
    }

    pub fn query_kind(&self) -> Arc<dyn QueryKind> {
        Arc::clone(&self.query_kind)
    }
}

/// Unqualified part of a `::`-separated type name.
pub fn short_name(name: &str) -> &str {
    name.rsplit("::").next().unwrap_or(name)
}

#[derive(Debug, Clone)]
pub struct Hierarchy {
    table: String,
    column: String,
    primary_key: String,
    root: String,
    types: BTreeMap<String, EntityType>,
    registry: HashMap<String, String>,
}

impl Hierarchy {
    pub fn builder(table: impl Into<String>, root: impl Into<String>) -> HierarchyBuilder {
        HierarchyBuilder::new(table, root)
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Discriminator column shared by every type of the hierarchy.
    pub fn column_name(&self) -> &str {
        &self.column
    }

    pub fn column_name_for(&self, entity: &str) -> Result<&str> {
        self.entity(entity)?;
        Ok(&self.column)
    }

    pub fn root(&self) -> &EntityType {
        &self.types[&self.root]
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.types.contains_key(entity)
    }

    pub fn entity(&self, entity: &str) -> Result<&EntityType> {
        self.types
            .get(entity)
            .ok_or_else(|| StiError::UnknownEntity(entity.to_string()))
    }

    pub fn types(&self) -> impl Iterator<Item = &EntityType> {
        self.types.values()
    }

    /// Value stored in the discriminator column for `explicit` when given,
    /// otherwise for `entity`. Root types store `None`.
    pub fn discriminator_value(&self, entity: &str, explicit: Option<&str>) -> Result<Option<&str>> {
        let target = self.entity(explicit.unwrap_or(entity))?;
        Ok(target.discriminator())
    }

    pub fn is_root_type(&self, entity: &str) -> Result<bool> {
        Ok(self.entity(entity)?.is_root)
    }

    pub fn is_sti_enabled(&self, entity: &str) -> Result<bool> {
        Ok(self.entity(entity)?.sti_enabled)
    }

    /// Whether a write of `entity` must stamp the discriminator column.
    pub fn is_sti_required(&self, entity: &str, schema: &TableSchema) -> Result<bool> {
        let node = self.entity(entity)?;
        Ok(node.sti_enabled && schema.has_column(&self.column) && !node.is_root)
    }

    /// Registered type for a stored discriminator value.
    pub fn resolve(&self, value: &str) -> Option<&EntityType> {
        self.registry.get(value).and_then(|name| self.types.get(name))
    }

    /// Chain from the root down to `entity`, both included.
    pub fn ancestors(&self, entity: &str) -> Result<Vec<&EntityType>> {
        let mut chain = vec![self.entity(entity)?];
        while let Some(parent) = chain.last().copied().and_then(|node| node.parent.as_deref()) {
            chain.push(self.entity(parent)?);
        }
        chain.reverse();
        Ok(chain)
    }

    /// Every type below `entity`, depth first, `entity` excluded.
    pub fn descendants(&self, entity: &str) -> Result<Vec<&EntityType>> {
        let mut found = Vec::new();
        let mut stack: Vec<&str> = self
            .entity(entity)?
            .children
            .iter()
            .rev()
            .map(String::as_str)
            .collect();
        while let Some(name) = stack.pop() {
            let node = self.entity(name)?;
            found.push(node);
            stack.extend(node.children.iter().rev().map(String::as_str));
        }
        Ok(found)
    }

    /// True when `ancestor` is `entity` itself or lies above it.
    pub fn is_descendant_of(&self, entity: &str, ancestor: &str) -> Result<bool> {
        Ok(self
            .ancestors(entity)?
            .iter()
            .any(|node| node.name == ancestor))
    }

    /// Discriminator settings a find operation on `entity` starts with.
    pub fn sti_condition(&self, entity: &str) -> Result<StiCondition> {
        let node = self.entity(entity)?;
        let descendants = self
            .descendants(entity)?
            .into_iter()
            .filter_map(|child| child.discriminator.clone())
            .collect();
        Ok(StiCondition {
            column: ColumnRef::qualified(self.table.clone(), self.column.clone()),
            value: node.discriminator.clone(),
            descendants,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType};
    use crate::query::DescendantsQuery;

    fn zoo() -> Hierarchy {
        Hierarchy::builder("animals", "zoo::Animal")
            .subtype("zoo::Dog", "zoo::Animal")
            .subtype("zoo::Cat", "zoo::Animal")
            .subtype("zoo::Puppy", "zoo::Dog")
            .build()
            .unwrap()
    }

    fn schema(with_type: bool) -> TableSchema {
        let mut columns = vec![
            Column::new("id", DataType::Integer).primary_key(),
            Column::new("name", DataType::Text),
        ];
        if with_type {
            columns.push(Column::new("type", DataType::Text));
        }
        TableSchema::new("animals", columns)
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("zoo::Dog"), "Dog");
        assert_eq!(short_name("Dog"), "Dog");
    }

    #[test]
    fn test_default_discriminator_is_short_name() {
        let zoo = zoo();
        assert_eq!(zoo.discriminator_value("zoo::Dog", None).unwrap(), Some("Dog"));
        assert_eq!(
            zoo.discriminator_value("zoo::Dog", Some("zoo::Cat")).unwrap(),
            Some("Cat")
        );
        assert_eq!(zoo.discriminator_value("zoo::Animal", None).unwrap(), None);
        assert_eq!(zoo.column_name_for("zoo::Cat").unwrap(), "type");
    }

    #[test]
    fn test_root_iff_null_discriminator() {
        let zoo = zoo();
        for node in zoo.types() {
            assert_eq!(
                zoo.is_root_type(node.name()).unwrap(),
                zoo.discriminator_value(node.name(), None).unwrap().is_none()
            );
        }
        assert!(zoo.is_root_type("zoo::Animal").unwrap());
        assert!(!zoo.is_root_type("zoo::Puppy").unwrap());
    }

    #[test]
    fn test_same_short_name_layer_stays_root() {
        let hierarchy = Hierarchy::builder("animals", "base::Animal")
            .subtype("app::Animal", "base::Animal")
            .subtype("app::Dog", "app::Animal")
            .build()
            .unwrap();
        assert!(hierarchy.is_root_type("app::Animal").unwrap());
        assert_eq!(hierarchy.discriminator_value("app::Animal", None).unwrap(), None);
        assert!(!hierarchy.is_root_type("app::Dog").unwrap());
    }

    #[test]
    fn test_is_sti_required() {
        let zoo = zoo();
        assert!(zoo.is_sti_required("zoo::Dog", &schema(true)).unwrap());
        assert!(!zoo.is_sti_required("zoo::Dog", &schema(false)).unwrap());
        assert!(!zoo.is_sti_required("zoo::Animal", &schema(true)).unwrap());

        let partial = Hierarchy::builder("animals", "zoo::Animal")
            .subtype("zoo::Dog", "zoo::Animal")
            .subtype("zoo::Puppy", "zoo::Dog")
            .disable_sti("zoo::Dog")
            .build()
            .unwrap();
        assert!(!partial.is_sti_required("zoo::Dog", &schema(true)).unwrap());
        assert!(!partial.is_sti_enabled("zoo::Puppy").unwrap());
    }

    #[test]
    fn test_resolve_and_tree_walks() {
        let zoo = zoo();
        assert_eq!(zoo.resolve("Puppy").map(EntityType::name), Some("zoo::Puppy"));
        assert!(zoo.resolve("Horse").is_none());

        let ancestors: Vec<&str> = zoo
            .ancestors("zoo::Puppy")
            .unwrap()
            .into_iter()
            .map(EntityType::name)
            .collect();
        assert_eq!(ancestors, vec!["zoo::Animal", "zoo::Dog", "zoo::Puppy"]);

        let descendants: Vec<&str> = zoo
            .descendants("zoo::Animal")
            .unwrap()
            .into_iter()
            .map(EntityType::name)
            .collect();
        assert_eq!(descendants, vec!["zoo::Dog", "zoo::Puppy", "zoo::Cat"]);
        assert!(zoo.is_descendant_of("zoo::Puppy", "zoo::Animal").unwrap());
        assert!(!zoo.is_descendant_of("zoo::Cat", "zoo::Dog").unwrap());
    }

    #[test]
    fn test_sti_condition() {
        let zoo = zoo();
        let condition = zoo.sti_condition("zoo::Dog").unwrap();
        assert_eq!(condition.column.to_string(), "animals.type");
        assert_eq!(condition.value.as_deref(), Some("Dog"));
        assert_eq!(condition.descendants, vec!["Puppy".to_string()]);
    }

    #[test]
    fn test_query_kind_is_inherited() {
        let zoo = Hierarchy::builder("animals", "zoo::Animal")
            .subtype("zoo::Dog", "zoo::Animal")
            .subtype("zoo::Puppy", "zoo::Dog")
            .query_kind("zoo::Dog", Arc::new(DescendantsQuery))
            .build()
            .unwrap();
        assert_eq!(zoo.entity("zoo::Puppy").unwrap().query_kind().name(), "descendants");
        assert_eq!(zoo.entity("zoo::Animal").unwrap().query_kind().name(), "sti");
    }

    #[test]
    fn test_unknown_entity() {
        let err = zoo().is_root_type("zoo::Horse").unwrap_err();
        assert!(matches!(err, StiError::UnknownEntity(name) if name == "zoo::Horse"));
    }
}
