use super::{DEFAULT_PRIMARY_KEY, DEFAULT_STI_COLUMN, EntityType, Hierarchy, short_name};
use crate::core::{Result, StiError};
use crate::query::{QueryKind, QueryKindName};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;

/// Declarative hierarchy description, loadable from JSON.
///
/// ```
/// use stimap::HierarchyConfig;
///
/// let config = HierarchyConfig::from_json(r#"{
///     "table": "animals",
///     "root": "zoo::Animal",
///     "types": [
///         { "name": "zoo::Dog", "parent": "zoo::Animal" },
///         { "name": "zoo::Cat", "parent": "zoo::Animal", "discriminator": "feline" }
///     ]
/// }"#).unwrap();
///
/// let hierarchy = config.build().unwrap();
/// assert_eq!(hierarchy.resolve("feline").unwrap().name(), "zoo::Cat");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Physical table shared by every type.
    pub table: String,

    /// Fully qualified name of the root type.
    pub root: String,

    /// Discriminator column name.
    #[serde(default = "default_column")]
    pub column: String,

    /// Primary key column used for updates.
    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    /// STI switch for the root; children inherit it unless overridden.
    #[serde(default = "default_true")]
    pub sti_enabled: bool,

    /// Query kind of the root; children inherit it unless overridden.
    #[serde(default)]
    pub query: QueryKindName,

    /// Non-root types, in any order.
    #[serde(default)]
    pub types: Vec<EntityTypeConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeConfig {
    pub name: String,
    pub parent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sti_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryKindName>,
}

fn default_column() -> String {
    DEFAULT_STI_COLUMN.to_string()
}

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

fn default_true() -> bool {
    true
}

impl HierarchyConfig {
    pub fn new(table: &str, root: &str) -> Self {
        Self {
            table: table.to_string(),
            root: root.to_string(),
            column: default_column(),
            primary_key: default_primary_key(),
            sti_enabled: true,
            query: QueryKindName::Sti,
            types: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Structural checks that do not need the resolved tree.
    pub fn validate(&self) -> Result<()> {
        if self.table.is_empty() {
            return Err(StiError::HierarchyConfig("table cannot be empty".to_string()));
        }
        if self.root.is_empty() {
            return Err(StiError::HierarchyConfig("root cannot be empty".to_string()));
        }
        if self.column.is_empty() {
            return Err(StiError::HierarchyConfig(
                "discriminator column cannot be empty".to_string(),
            ));
        }
        if self.primary_key.is_empty() {
            return Err(StiError::HierarchyConfig("primary_key cannot be empty".to_string()));
        }

        let mut seen = HashSet::from([self.root.as_str()]);
        for entry in &self.types {
            if entry.name.is_empty() {
                return Err(StiError::HierarchyConfig("type name cannot be empty".to_string()));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(StiError::HierarchyConfig(format!(
                    "type '{}' is declared twice",
                    entry.name
                )));
            }
            if entry.name == entry.parent {
                return Err(StiError::HierarchyConfig(format!(
                    "type '{}' cannot be its own parent",
                    entry.name
                )));
            }
            if matches!(entry.discriminator.as_deref(), Some("")) {
                return Err(StiError::HierarchyConfig(format!(
                    "type '{}' has an empty discriminator",
                    entry.name
                )));
            }
        }
        for entry in &self.types {
            if !seen.contains(entry.parent.as_str()) {
                return Err(StiError::HierarchyConfig(format!(
                    "parent '{}' of type '{}' is not declared",
                    entry.parent, entry.name
                )));
            }
        }
        Ok(())
    }

    pub fn build(&self) -> Result<Hierarchy> {
        self.build_with_kinds(&HashMap::new())
    }

    fn build_with_kinds(&self, kinds: &HashMap<String, Arc<dyn QueryKind>>) -> Result<Hierarchy> {
        self.validate()?;

        let entries: HashMap<&str, &EntityTypeConfig> =
            self.types.iter().map(|entry| (entry.name.as_str(), entry)).collect();
        let mut children: HashMap<&str, Vec<String>> = HashMap::new();
        for entry in &self.types {
            children
                .entry(entry.parent.as_str())
                .or_default()
                .push(entry.name.clone());
        }

        let root_kind = kinds
            .get(&self.root)
            .cloned()
            .unwrap_or_else(|| self.query.into_kind());
        let mut types = BTreeMap::new();
        types.insert(
            self.root.clone(),
            EntityType {
                name: self.root.clone(),
                short_name: short_name(&self.root).to_string(),
                parent: None,
                children: children.get(self.root.as_str()).cloned().unwrap_or_default(),
                discriminator: None,
                is_root: true,
                sti_enabled: self.sti_enabled,
                query_kind: root_kind,
            },
        );

        // Parents are resolved before their children.
        let mut queue: VecDeque<String> = children
            .get(self.root.as_str())
            .cloned()
            .unwrap_or_default()
            .into();
        while let Some(name) = queue.pop_front() {
            let entry = entries[name.as_str()];
            let parent: &EntityType = &types[&entry.parent];
            let short = short_name(&entry.name).to_string();
            let is_root = parent.is_root && parent.short_name == short;
            let discriminator = if is_root {
                None
            } else {
                Some(entry.discriminator.clone().unwrap_or_else(|| short.clone()))
            };
            let query_kind = match (kinds.get(&entry.name), entry.query) {
                (Some(kind), _) => Arc::clone(kind),
                (None, Some(named)) => named.into_kind(),
                (None, None) => Arc::clone(&parent.query_kind),
            };
            let node = EntityType {
                name: entry.name.clone(),
                short_name: short,
                parent: Some(entry.parent.clone()),
                children: children.get(name.as_str()).cloned().unwrap_or_default(),
                discriminator,
                is_root,
                sti_enabled: entry.sti_enabled.unwrap_or(parent.sti_enabled),
                query_kind,
            };
            queue.extend(node.children.iter().cloned());
            types.insert(name, node);
        }

        if types.len() != self.types.len() + 1 {
            let orphaned: Vec<&str> = self
                .types
                .iter()
                .filter(|entry| !types.contains_key(&entry.name))
                .map(|entry| entry.name.as_str())
                .collect();
            return Err(StiError::HierarchyConfig(format!(
                "types not connected to root '{}': {}",
                self.root,
                orphaned.join(", ")
            )));
        }

        if let Some(name) = kinds.keys().find(|name| !types.contains_key(*name)) {
            return Err(StiError::UnknownEntity(name.clone()));
        }

        let mut registry: HashMap<String, String> = HashMap::new();
        for node in types.values() {
            let Some(value) = &node.discriminator else {
                continue;
            };
            if let Some(first) = registry.get(value) {
                return Err(StiError::DiscriminatorCollision {
                    value: value.clone(),
                    first: first.clone(),
                    second: node.name.clone(),
                });
            }
            registry.insert(value.clone(), node.name.clone());
        }

        Ok(Hierarchy {
            table: self.table.clone(),
            column: self.column.clone(),
            primary_key: self.primary_key.clone(),
            root: self.root.clone(),
            types,
            registry,
        })
    }
}

/// Fluent construction of a [`Hierarchy`], with custom query kinds.
///
/// ```
/// use stimap::Hierarchy;
///
/// let hierarchy = Hierarchy::builder("animals", "zoo::Animal")
///     .column("kind")
///     .subtype("zoo::Dog", "zoo::Animal")
///     .discriminator("zoo::Dog", "canine")
///     .build()
///     .unwrap();
///
/// assert_eq!(hierarchy.column_name(), "kind");
/// assert_eq!(hierarchy.discriminator_value("zoo::Dog", None).unwrap(), Some("canine"));
/// ```
#[derive(Debug, Clone)]
pub struct HierarchyBuilder {
    config: HierarchyConfig,
    discriminators: BTreeMap<String, String>,
    sti_overrides: BTreeMap<String, bool>,
    kinds: HashMap<String, Arc<dyn QueryKind>>,
}

impl HierarchyBuilder {
    pub fn new(table: impl Into<String>, root: impl Into<String>) -> Self {
        Self::from_config(HierarchyConfig::new(&table.into(), &root.into()))
    }

    pub fn from_config(config: HierarchyConfig) -> Self {
        Self {
            config,
            discriminators: BTreeMap::new(),
            sti_overrides: BTreeMap::new(),
            kinds: HashMap::new(),
        }
    }

    /// Set the discriminator column
    pub fn column(mut self, column: &str) -> Self {
        self.config.column = column.to_string();
        self
    }

    /// Set the primary key column
    pub fn primary_key(mut self, column: &str) -> Self {
        self.config.primary_key = column.to_string();
        self
    }

    /// Register a type under `parent`
    pub fn subtype(mut self, name: &str, parent: &str) -> Self {
        self.config.types.push(EntityTypeConfig {
            name: name.to_string(),
            parent: parent.to_string(),
            discriminator: None,
            sti_enabled: None,
            query: None,
        });
        self
    }

    /// Override the stored value of a type
    pub fn discriminator(mut self, name: &str, value: &str) -> Self {
        self.discriminators.insert(name.to_string(), value.to_string());
        self
    }

    /// Turn STI off for a type and, unless they override it, its children
    pub fn disable_sti(mut self, name: &str) -> Self {
        self.sti_overrides.insert(name.to_string(), false);
        self
    }

    /// Turn STI back on below a disabled branch
    pub fn enable_sti(mut self, name: &str) -> Self {
        self.sti_overrides.insert(name.to_string(), true);
        self
    }

    /// Use a custom query kind for a type and its children
    pub fn query_kind(mut self, name: &str, kind: Arc<dyn QueryKind>) -> Self {
        self.kinds.insert(name.to_string(), kind);
        self
    }

    /// Configuration with every override applied. Overrides may name types
    /// registered later in the chain, but not types that never are.
    pub fn to_config(&self) -> Result<HierarchyConfig> {
        let mut config = self.config.clone();
        for (name, value) in &self.discriminators {
            if *name == config.root {
                return Err(StiError::HierarchyConfig(format!(
                    "root type '{}' cannot have a discriminator value",
                    name
                )));
            }
            entry_mut(&mut config, name)?.discriminator = Some(value.clone());
        }
        for (name, enabled) in &self.sti_overrides {
            if *name == config.root {
                config.sti_enabled = *enabled;
            } else {
                entry_mut(&mut config, name)?.sti_enabled = Some(*enabled);
            }
        }
        Ok(config)
    }

    pub fn build(self) -> Result<Hierarchy> {
        self.to_config()?.build_with_kinds(&self.kinds)
    }
}

fn entry_mut<'a>(config: &'a mut HierarchyConfig, name: &str) -> Result<&'a mut EntityTypeConfig> {
    config
        .types
        .iter_mut()
        .find(|entry| entry.name == name)
        .ok_or_else(|| StiError::UnknownEntity(name.to_string()))
}
