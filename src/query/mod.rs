//! Typed statements issued against a [`Persistence`](crate::Persistence)
//! backend.
//!
//! Statements are built as values, never as strings. Their `Display`
//! output is SQL text, used only for logging.

pub mod filter;

pub use filter::Filter;

use crate::core::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => write!(f, "ASC"),
            Direction::Desc => write!(f, "DESC"),
        }
    }
}

/// `SELECT * FROM table WHERE filter ORDER BY column dir LIMIT n`
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: String,
    pub filter: Filter,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Select {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: Filter::All,
            order_by: None,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = self.filter.and(filter);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT * FROM {}", self.table)?;
        if self.filter != Filter::All {
            write!(f, " WHERE {}", self.filter)?;
        }
        if let Some((column, direction)) = &self.order_by {
            write!(f, " ORDER BY {} {}", column, direction)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Min,
    Max,
}

/// `SELECT MIN(column) FROM table`
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub function: AggregateFunction,
    pub table: String,
    pub column: String,
}

impl Aggregate {
    pub fn min(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            function: AggregateFunction::Min,
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn max(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            function: AggregateFunction::Max,
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.function {
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        };
        write!(f, "SELECT {}({}) FROM {}", name, self.column, self.table)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// `column = value`
    Set(Value),
    /// `column = column + delta`
    Shift(i64),
}

/// `UPDATE table SET column = ... WHERE filter`
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: String,
    pub column: String,
    pub assignment: Assignment,
    pub filter: Filter,
}

impl Update {
    pub fn set(table: impl Into<String>, column: impl Into<String>, value: Value) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            assignment: Assignment::Set(value),
            filter: Filter::All,
        }
    }

    pub fn shift(table: impl Into<String>, column: impl Into<String>, delta: i64) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            assignment: Assignment::Shift(delta),
            filter: Filter::All,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = self.filter.and(filter);
        self
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UPDATE {} SET {} = ", self.table, self.column)?;
        match &self.assignment {
            Assignment::Set(value) => write!(f, "{}", value)?,
            Assignment::Shift(delta) if *delta < 0 => {
                write!(f, "{} - {}", self.column, delta.unsigned_abs())?
            }
            Assignment::Shift(delta) => write!(f, "{} + {}", self.column, delta)?,
        }
        if self.filter != Filter::All {
            write!(f, " WHERE {}", self.filter)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_renders_like_sql() {
        let select = Select::from("Sortable")
            .filter(Filter::Gt("position".into(), Value::Integer(2)))
            .order_by("position", Direction::Asc)
            .limit(1);
        assert_eq!(
            select.to_string(),
            "SELECT * FROM Sortable WHERE position > 2 ORDER BY position ASC LIMIT 1"
        );
    }

    #[test]
    fn test_shift_renders_sign() {
        let down = Update::shift("Sortable", "position", -1).filter(Filter::Between(
            "position".into(),
            Value::Integer(3),
            Value::Integer(5),
        ));
        assert_eq!(
            down.to_string(),
            "UPDATE Sortable SET position = position - 1 WHERE position BETWEEN 3 AND 5"
        );
        assert_eq!(
            Update::shift("Sortable", "position", 1).to_string(),
            "UPDATE Sortable SET position = position + 1"
        );
    }

    #[test]
    fn test_aggregate_renders() {
        assert_eq!(
            Aggregate::max("Sortable", "position").to_string(),
            "SELECT MAX(position) FROM Sortable"
        );
    }
}
