//! Record validation capability.
//!
//! [`RuleValidator`] runs a chain of [`ValidationRule`]s per entity type.
//! Rules declared on a type also apply to every type below it, so a record
//! converted to another type is checked against the target's full shape.

use crate::core::{DataType, Value};
use crate::hierarchy::Hierarchy;
use crate::record::Record;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Field name to messages. An empty set means the record is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .flat_map(|(field, messages)| {
                messages.iter().map(move |message| format!("{}: {}", field, message))
            })
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Attribute and business-rule validation of a record.
pub trait Validator: Send + Sync {
    fn validate(&self, record: &Record) -> Result<(), ValidationErrors>;
}

/// Accepts every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate(&self, _record: &Record) -> Result<(), ValidationErrors> {
        Ok(())
    }
}

/// One link of a validation chain.
pub trait ValidationRule: fmt::Debug + Send + Sync {
    fn check(&self, record: &Record, errors: &mut ValidationErrors);
}

/// Field must be present, not null and not blank text.
#[derive(Debug, Clone)]
pub struct Required(pub String);

impl ValidationRule for Required {
    fn check(&self, record: &Record, errors: &mut ValidationErrors) {
        let blank = match record.get(&self.0) {
            None | Some(Value::Null) => true,
            Some(Value::Text(text)) => text.trim().is_empty(),
            Some(_) => false,
        };
        if blank {
            errors.add(&self.0, "cannot be blank");
        }
    }
}

/// Field may be absent but never explicitly null.
#[derive(Debug, Clone)]
pub struct NotNull(pub String);

impl ValidationRule for NotNull {
    fn check(&self, record: &Record, errors: &mut ValidationErrors) {
        if record.get(&self.0).is_some_and(Value::is_null) {
            errors.add(&self.0, "cannot be null");
        }
    }
}

/// Field, when set, must hold a value of the given type.
#[derive(Debug, Clone)]
pub struct TypeOf(pub String, pub DataType);

impl ValidationRule for TypeOf {
    fn check(&self, record: &Record, errors: &mut ValidationErrors) {
        if let Some(value) = record.get(&self.0)
            && !self.1.is_compatible(value)
        {
            errors.add(
                &self.0,
                format!("must be {}, got {}", self.1, value.type_name()),
            );
        }
    }
}

/// Field, when set, must be one of the listed values.
#[derive(Debug, Clone)]
pub struct OneOf(pub String, pub Vec<Value>);

impl ValidationRule for OneOf {
    fn check(&self, record: &Record, errors: &mut ValidationErrors) {
        match record.get(&self.0) {
            None | Some(Value::Null) => {}
            Some(value) if self.1.contains(value) => {}
            Some(value) => errors.add(&self.0, format!("{} is not an allowed value", value)),
        }
    }
}

/// Ad hoc rule backed by a function.
#[derive(Clone)]
pub struct Check {
    field: String,
    message: String,
    check: fn(&Record) -> bool,
}

impl Check {
    pub fn new(field: impl Into<String>, message: impl Into<String>, check: fn(&Record) -> bool) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            check,
        }
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check")
            .field("field", &self.field)
            .field("message", &self.message)
            .finish()
    }
}

impl ValidationRule for Check {
    fn check(&self, record: &Record, errors: &mut ValidationErrors) {
        if !(self.check)(record) {
            errors.add(&self.field, &self.message);
        }
    }
}

/// Validator holding rule chains keyed by entity type.
#[derive(Debug, Clone)]
pub struct RuleValidator {
    hierarchy: Arc<Hierarchy>,
    rules: HashMap<String, Vec<Arc<dyn ValidationRule>>>,
}

impl RuleValidator {
    pub fn new(hierarchy: Arc<Hierarchy>) -> Self {
        Self {
            hierarchy,
            rules: HashMap::new(),
        }
    }

    pub fn rule(mut self, entity: &str, rule: impl ValidationRule + 'static) -> Self {
        self.rules
            .entry(entity.to_string())
            .or_default()
            .push(Arc::new(rule));
        self
    }

    /// Rules applied to `entity`, inherited ones first.
    pub fn rules_for(&self, entity: &str) -> Vec<&dyn ValidationRule> {
        let chain: Vec<&str> = match self.hierarchy.ancestors(entity) {
            Ok(nodes) => nodes.into_iter().map(|node| node.name()).collect(),
            Err(_) => vec![entity],
        };
        chain
            .into_iter()
            .filter_map(|name| self.rules.get(name))
            .flatten()
            .map(|rule| &**rule)
            .collect()
    }
}

impl Validator for RuleValidator {
    fn validate(&self, record: &Record) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for rule in self.rules_for(record.entity()) {
            rule.check(record, &mut errors);
        }
        errors.into_result()
    }
}
