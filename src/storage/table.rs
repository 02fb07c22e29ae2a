use crate::core::{Result, Row, StiError, TableSchema, Value};
use std::collections::BTreeMap;

/// Rows of one table, kept in insertion order.
#[derive(Debug, Clone)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<usize, Row>,
    next_row_id: usize,
    next_key: i64,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            next_row_id: 0,
            next_key: 1,
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Stores `row` and returns it as stored. Missing columns read as NULL
    /// and an absent integer primary key is generated.
    pub fn insert(&mut self, mut row: Row) -> Result<Row> {
        for column in self.schema.columns() {
            row.entry(column.name.clone()).or_insert(Value::Null);
        }
        if let Some(pk) = self.schema.primary_key()
            && row.get(&pk.name).is_some_and(Value::is_null)
            && pk.data_type.is_compatible(&Value::Integer(0))
        {
            row.insert(pk.name.clone(), Value::Integer(self.next_key));
        }

        self.validate_row(&row)?;
        self.check_uniqueness(&row, None)?;

        if let Some(key) = self.key_of(&row).and_then(Value::as_i64) {
            self.next_key = self.next_key.max(key + 1);
        }
        let id = self.next_row_id;
        self.next_row_id += 1;
        self.rows.insert(id, row.clone());
        Ok(row)
    }

    /// Applies `changes` to the row whose `column` equals `value`.
    /// Returns `false` when no row matched.
    pub fn update_where(&mut self, column: &str, value: &Value, changes: &Row) -> Result<bool> {
        let Some(id) = self.position(column, value) else {
            return Ok(false);
        };

        let mut updated = self.rows[&id].clone();
        for (name, new_value) in changes {
            updated.insert(name.clone(), new_value.clone());
        }
        self.validate_row(&updated)?;
        self.check_uniqueness(&updated, Some(id))?;
        self.rows.insert(id, updated);
        Ok(true)
    }

    pub fn scan(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    fn position(&self, column: &str, value: &Value) -> Option<usize> {
        if value.is_null() {
            return None;
        }
        self.rows
            .iter()
            .find(|(_, row)| row.get(column) == Some(value))
            .map(|(id, _)| *id)
    }

    fn key_of<'a>(&self, row: &'a Row) -> Option<&'a Value> {
        self.schema.primary_key().and_then(|pk| row.get(&pk.name))
    }

    fn validate_row(&self, row: &Row) -> Result<()> {
        for (name, value) in row {
            let column = self.schema.get_column(name).ok_or_else(|| {
                StiError::ColumnNotFound(name.clone(), self.schema.name().to_string())
            })?;
            column.validate(value)?;
        }
        Ok(())
    }

    fn check_uniqueness(&self, row: &Row, ignore_id: Option<usize>) -> Result<()> {
        let Some(pk) = self.schema.primary_key() else {
            return Ok(());
        };
        let Some(value) = row.get(&pk.name).filter(|value| !value.is_null()) else {
            return Ok(());
        };
        let duplicate = self
            .rows
            .iter()
            .any(|(id, existing)| Some(*id) != ignore_id && existing.get(&pk.name) == Some(value));
        if duplicate {
            return Err(StiError::ConstraintViolation(format!(
                "Unique constraint violation: Column '{}' already contains value {}",
                pk.name, value
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType};

    fn animals() -> Table {
        Table::new(TableSchema::new(
            "animals",
            vec![
                Column::new("id", DataType::Integer).primary_key(),
                Column::new("type", DataType::Text),
                Column::new("name", DataType::Text).not_null(),
            ],
        ))
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_insert_generates_keys_and_fills_nulls() {
        let mut table = animals();
        let first = table.insert(row(&[("name", "Rex".into())])).unwrap();
        assert_eq!(first.get("id"), Some(&Value::Integer(1)));
        assert_eq!(first.get("type"), Some(&Value::Null));

        table.insert(row(&[("id", 10.into()), ("name", "Fido".into())])).unwrap();
        let third = table.insert(row(&[("name", "Tom".into())])).unwrap();
        assert_eq!(third.get("id"), Some(&Value::Integer(11)));
        assert_eq!(table.scan().count(), 3);
    }

    #[test]
    fn test_insert_rejects_bad_rows() {
        let mut table = animals();
        assert!(matches!(
            table.insert(row(&[("name", Value::Null)])),
            Err(StiError::ConstraintViolation(_))
        ));
        assert!(matches!(
            table.insert(row(&[("name", "Rex".into()), ("legs", 4.into())])),
            Err(StiError::ColumnNotFound(..))
        ));
        assert!(matches!(
            table.insert(row(&[("name", 5.into())])),
            Err(StiError::TypeMismatch(_))
        ));

        table.insert(row(&[("id", 1.into()), ("name", "Rex".into())])).unwrap();
        let err = table
            .insert(row(&[("id", 1.into()), ("name", "Fido".into())]))
            .unwrap_err();
        assert!(err.to_string().contains("Unique constraint violation"));
    }

    #[test]
    fn test_update_where() {
        let mut table = animals();
        table.insert(row(&[("name", "Fido".into()), ("type", "Dog".into())])).unwrap();

        let changed = table
            .update_where("id", &Value::Integer(1), &row(&[("type", "Cat".into())]))
            .unwrap();
        assert!(changed);
        let stored: Vec<&Row> = table.scan().collect();
        assert_eq!(stored[0].get("type"), Some(&Value::from("Cat")));
        assert_eq!(stored[0].get("name"), Some(&Value::from("Fido")));

        let missing = table
            .update_where("id", &Value::Integer(7), &row(&[("type", "Cat".into())]))
            .unwrap();
        assert!(!missing);
    }
}
