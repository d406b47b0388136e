use crate::core::{OrmError, Result, Row, Schema, Value};
use std::cmp::Ordering;
use std::fmt;

/// Row predicate understood by the storage layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every row.
    All,
    Eq(String, Value),
    Ne(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    /// Inclusive on both ends, like SQL `BETWEEN`.
    Between(String, Value, Value),
    And(Vec<Filter>),
}

impl Filter {
    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, Filter::And(mut right)) => {
                right.insert(0, f);
                Filter::And(right)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    /// Evaluates the predicate against a row laid out by `schema`.
    ///
    /// A NULL column value never satisfies a comparison.
    pub fn matches(&self, row: &Row, schema: &Schema, table: &str) -> Result<bool> {
        let cell = |column: &str| -> Result<&Value> {
            let idx = schema
                .find_column_index(column)
                .ok_or_else(|| OrmError::ColumnNotFound(column.to_string(), table.to_string()))?;
            Ok(&row[idx])
        };
        let cmp = |column: &str, value: &Value| -> Result<Option<Ordering>> {
            let current = cell(column)?;
            if current.is_null() || value.is_null() {
                return Ok(None);
            }
            current.compare(value).map(Some)
        };

        match self {
            Filter::All => Ok(true),
            Filter::Eq(c, v) => Ok(cmp(c, v)? == Some(Ordering::Equal)),
            Filter::Ne(c, v) => Ok(matches!(
                cmp(c, v)?,
                Some(Ordering::Less | Ordering::Greater)
            )),
            Filter::Gt(c, v) => Ok(cmp(c, v)? == Some(Ordering::Greater)),
            Filter::Gte(c, v) => Ok(matches!(
                cmp(c, v)?,
                Some(Ordering::Greater | Ordering::Equal)
            )),
            Filter::Lt(c, v) => Ok(cmp(c, v)? == Some(Ordering::Less)),
            Filter::Between(c, low, high) => {
                let above = matches!(cmp(c, low)?, Some(Ordering::Greater | Ordering::Equal));
                let below = matches!(cmp(c, high)?, Some(Ordering::Less | Ordering::Equal));
                Ok(above && below)
            }
            Filter::And(filters) => {
                for filter in filters {
                    if !filter.matches(row, schema, table)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => write!(f, "TRUE"),
            Filter::Eq(c, v) => write!(f, "{} = {}", c, v),
            Filter::Ne(c, v) => write!(f, "{} <> {}", c, v),
            Filter::Gt(c, v) => write!(f, "{} > {}", c, v),
            Filter::Gte(c, v) => write!(f, "{} >= {}", c, v),
            Filter::Lt(c, v) => write!(f, "{} < {}", c, v),
            Filter::Between(c, low, high) => write!(f, "{} BETWEEN {} AND {}", c, low, high),
            Filter::And(filters) => {
                for (i, filter) in filters.iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    write!(f, "{}", filter)?;
                }
                Ok(())
            }
        }
    }
}
