//! Query objects for STI-enabled entity types.
//!
//! A [`Query`] is built per find operation, receives its discriminator
//! predicate exactly once in [`Query::prepare`], and is discarded after it
//! ran.

pub mod kind;
pub mod predicate;

pub use kind::{
    DescendantsQuery, PlainQuery, QueryKind, QueryKindName, StiCondition, StiPredicate, StiQuery,
    supports_sti,
};
pub use predicate::{ColumnRef, Predicate};

use crate::core::{Row, Value};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Query {
    entity: String,
    table: String,
    kind: Arc<dyn QueryKind>,
    condition: StiCondition,
    sti_condition_enabled: bool,
    predicates: Vec<Predicate>,
    order_by: Option<String>,
    limit: Option<usize>,
    prepared: bool,
}

impl Query {
    pub fn new(
        entity: impl Into<String>,
        table: impl Into<String>,
        kind: Arc<dyn QueryKind>,
        condition: StiCondition,
        sti_condition_enabled: bool,
    ) -> Self {
        Self {
            entity: entity.into(),
            table: table.into(),
            kind,
            condition,
            sti_condition_enabled,
            predicates: Vec::new(),
            order_by: None,
            limit: None,
            prepared: false,
        }
    }

    /// The declaring entity type rows are instantiated against.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn kind(&self) -> &dyn QueryKind {
        self.kind.as_ref()
    }

    pub fn sti_column(&self) -> &str {
        &self.condition.column.name
    }

    pub fn sti_value(&self) -> Option<&str> {
        self.condition.value.as_deref()
    }

    pub fn condition(&self) -> &StiCondition {
        &self.condition
    }

    pub fn is_sti_condition_enabled(&self) -> bool {
        self.sti_condition_enabled
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn order_column(&self) -> Option<&str> {
        self.order_by.as_deref()
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub fn and_where(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn filter_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.and_where(Predicate::eq(column, value))
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Drops the discriminator condition for this query instance.
    ///
    /// Has no effect on a predicate already added by `prepare`.
    pub fn without_sti(mut self) -> Self {
        self.sti_condition_enabled = false;
        self
    }

    /// Appends the discriminator predicate built by the query kind.
    /// Runs once; later calls are no-ops.
    pub fn prepare(&mut self) {
        if self.prepared {
            return;
        }
        if self.sti_condition_enabled
            && let Some(sti) = self.kind.as_sti()
            && let Some(predicate) = sti.with_sti(&self.condition)
        {
            self.predicates.push(predicate);
        }
        self.prepared = true;
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.predicates.iter().all(|predicate| predicate.matches(row))
    }

    /// Renders the condition part of the query, mostly for logging.
    pub fn where_clause(&self) -> String {
        self.predicates
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dog_query() -> Query {
        Query::new(
            "Dog",
            "animals",
            Arc::new(StiQuery),
            StiCondition {
                column: ColumnRef::qualified("animals", "type"),
                value: Some("Dog".into()),
                descendants: Vec::new(),
            },
            true,
        )
    }

    #[test]
    fn test_prepare_adds_single_predicate() {
        let mut query = dog_query().filter_eq("name", "Fido");
        query.prepare();
        query.prepare();
        assert_eq!(query.predicates().len(), 2);
        assert_eq!(query.where_clause(), "name = 'Fido' AND animals.type = 'Dog'");
    }

    #[test]
    fn test_without_sti_before_prepare() {
        let mut query = dog_query().without_sti();
        query.prepare();
        assert!(query.predicates().is_empty());
    }

    #[test]
    fn test_without_sti_after_prepare_keeps_predicate() {
        let mut query = dog_query();
        query.prepare();
        let mut query = query.without_sti();
        query.prepare();
        assert_eq!(query.predicates().len(), 1);
        assert!(!query.is_sti_condition_enabled());
    }

    #[test]
    fn test_plain_kind_adds_nothing() {
        let mut query = Query::new(
            "Dog",
            "animals",
            Arc::new(PlainQuery),
            dog_query().condition().clone(),
            true,
        );
        query.prepare();
        assert!(query.predicates().is_empty());
    }
}
