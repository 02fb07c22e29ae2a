//! In-memory entity instances.
//!
//! A [`Record`] is bound to zero or one stored row. Its `old_attributes`
//! snapshot is the last state known to be persisted: a record without a
//! snapshot is new and will be inserted, a record with one is updated and
//! only its dirty attributes are written.

use crate::core::{Row, Value};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    entity: String,
    attributes: Row,
    old_attributes: Option<Row>,
}

impl Record {
    /// Bare construction without attributes, validation or mass assignment.
    pub fn raw(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            attributes: Row::new(),
            old_attributes: None,
        }
    }

    /// A new, not yet persisted record.
    pub fn new(entity: impl Into<String>, attributes: Row) -> Self {
        Self {
            entity: entity.into(),
            attributes,
            old_attributes: None,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    pub fn attributes(&self) -> &Row {
        &self.attributes
    }

    /// Copies every attribute from `row`, skipping any safety checks.
    pub fn set_attributes(&mut self, row: &Row) {
        for (name, value) in row {
            self.attributes.insert(name.clone(), value.clone());
        }
    }

    pub fn old_attributes(&self) -> Option<&Row> {
        self.old_attributes.as_ref()
    }

    pub fn set_old_attributes(&mut self, snapshot: Option<Row>) {
        self.old_attributes = snapshot;
    }

    pub(crate) fn take_old_attributes(&mut self) -> Option<Row> {
        self.old_attributes.take()
    }

    pub fn is_new_record(&self) -> bool {
        self.old_attributes.is_none()
    }

    /// Attribute names whose value differs from the persisted snapshot.
    /// Every attribute is dirty on a new record.
    pub fn dirty_attributes(&self) -> Vec<String> {
        match &self.old_attributes {
            None => self.attributes.keys().cloned().collect(),
            Some(old) => self
                .attributes
                .iter()
                .filter(|(name, value)| {
                    !old.get(*name).is_some_and(|stored| stored.is_identical(value))
                })
                .map(|(name, _)| name.clone())
                .collect(),
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty_attributes().is_empty()
    }

    /// Marks the current attributes as the persisted state.
    pub(crate) fn mark_clean(&mut self) {
        self.old_attributes = Some(self.attributes.clone());
    }

    /// Replaces attributes and snapshot with a freshly stored row.
    pub(crate) fn load_row(&mut self, row: Row) {
        self.old_attributes = Some(row.clone());
        self.attributes = row;
    }
}
