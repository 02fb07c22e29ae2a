//! Query kinds and the STI-aware predicate contract.
//!
//! A query kind is STI-aware when it exposes [`StiPredicate`] through
//! [`QueryKind::as_sti`]. Find operations refuse any other kind.

use super::predicate::{ColumnRef, Predicate};
use crate::core::Value;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// Discriminator settings propagated to a query when it is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StiCondition {
    pub column: ColumnRef,
    /// `None` for root types.
    pub value: Option<String>,
    /// Discriminator values of every non-root descendant of the queried type.
    pub descendants: Vec<String>,
}

/// Builds the discriminator predicate appended during `Query::prepare`.
///
/// Only called when the STI condition of the query is enabled, so an
/// override never has to handle suppression itself.
pub trait StiPredicate: Debug + Send + Sync {
    fn with_sti(&self, condition: &StiCondition) -> Option<Predicate> {
        Some(Predicate::eq(
            condition.column.clone(),
            Value::from(condition.value.clone()),
        ))
    }
}

pub trait QueryKind: Debug + Send + Sync {
    fn name(&self) -> &str;

    fn as_sti(&self) -> Option<&dyn StiPredicate> {
        None
    }
}

pub fn supports_sti(kind: &dyn QueryKind) -> bool {
    kind.as_sti().is_some()
}

/// Default kind: filters on exactly the queried type.
#[derive(Debug, Clone, Copy, Default)]
pub struct StiQuery;

impl StiPredicate for StiQuery {}

impl QueryKind for StiQuery {
    fn name(&self) -> &str {
        "sti"
    }

    fn as_sti(&self) -> Option<&dyn StiPredicate> {
        Some(self)
    }
}

/// Matches the queried type or any of its descendants.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescendantsQuery;

impl StiPredicate for DescendantsQuery {
    fn with_sti(&self, condition: &StiCondition) -> Option<Predicate> {
        let mut values: Vec<Value> = condition.value.iter().map(|v| Value::from(v.as_str())).collect();
        values.extend(condition.descendants.iter().map(|v| Value::from(v.as_str())));

        let column = condition.column.clone();
        match (condition.value.is_none(), values.is_empty()) {
            (true, true) => Some(Predicate::is_null(column)),
            (true, false) => Some(Predicate::Or(vec![
                Predicate::is_null(column.clone()),
                Predicate::in_list(column, values),
            ])),
            (false, _) if values.len() == 1 => Some(Predicate::eq(column, values.remove(0))),
            (false, _) => Some(Predicate::in_list(column, values)),
        }
    }
}

impl QueryKind for DescendantsQuery {
    fn name(&self) -> &str {
        "descendants"
    }

    fn as_sti(&self) -> Option<&dyn StiPredicate> {
        Some(self)
    }
}

/// A kind with no discriminator support.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainQuery;

impl QueryKind for PlainQuery {
    fn name(&self) -> &str {
        "plain"
    }
}

/// Built-in kinds addressable from a hierarchy configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKindName {
    #[default]
    Sti,
    Descendants,
    Plain,
}

impl QueryKindName {
    pub fn into_kind(self) -> Arc<dyn QueryKind> {
        match self {
            Self::Sti => Arc::new(StiQuery),
            Self::Descendants => Arc::new(DescendantsQuery),
            Self::Plain => Arc::new(PlainQuery),
        }
    }
}
