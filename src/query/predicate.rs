use crate::core::{Row, Value};
use std::fmt;

/// Column reference, optionally qualified by its table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
        }
    }
}

impl From<&str> for ColumnRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ColumnRef {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A filter condition evaluated against a single-table row.
///
/// `Eq` against `Value::Null` is an IS NULL test, the same way a hash
/// condition `{column: null}` is rendered by query builders.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq { column: ColumnRef, value: Value },
    In { column: ColumnRef, values: Vec<Value> },
    IsNull { column: ColumnRef, negated: bool },
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        Self::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn is_null(column: impl Into<ColumnRef>) -> Self {
        Self::IsNull {
            column: column.into(),
            negated: false,
        }
    }

    pub fn is_not_null(column: impl Into<ColumnRef>) -> Self {
        Self::IsNull {
            column: column.into(),
            negated: true,
        }
    }

    pub fn in_list(column: impl Into<ColumnRef>, values: Vec<Value>) -> Self {
        Self::In {
            column: column.into(),
            values,
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Self::Eq { column, value } => {
                let stored = lookup(row, column);
                if value.is_null() {
                    stored.is_null()
                } else {
                    !stored.is_null() && stored == value
                }
            }
            Self::In { column, values } => {
                let stored = lookup(row, column);
                !stored.is_null() && values.iter().any(|value| value == stored)
            }
            Self::IsNull { column, negated } => lookup(row, column).is_null() != *negated,
            Self::Or(parts) => parts.iter().any(|part| part.matches(row)),
        }
    }
}

fn lookup<'a>(row: &'a Row, column: &ColumnRef) -> &'a Value {
    static NULL: Value = Value::Null;
    row.get(&column.name).unwrap_or(&NULL)
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq { column, value } if value.is_null() => write!(f, "{} IS NULL", column),
            Self::Eq { column, value } => write!(f, "{} = {}", column, value),
            Self::In { column, values } => {
                let list: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "{} IN ({})", column, list.join(", "))
            }
            Self::IsNull { column, negated } => {
                write!(f, "{} IS {}NULL", column, if *negated { "NOT " } else { "" })
            }
            Self::Or(parts) => {
                let rendered: Vec<String> = parts.iter().map(ToString::to_string).collect();
                write!(f, "({})", rendered.join(" OR "))
            }
        }
    }
}
