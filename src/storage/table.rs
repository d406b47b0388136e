use crate::core::{Column, DataType, OrmError, Result, Row, Schema, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the identifier column every table starts with.
pub const ID_COLUMN: &str = "id";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    name: String,
    schema: Schema,
}

impl TableSchema {
    /// Builds a table schema, prepending the `id` primary key column when
    /// the caller did not declare one.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        let mut all = Vec::with_capacity(columns.len() + 1);
        if columns.first().is_none_or(|c| c.name != ID_COLUMN) {
            all.push(Column::new(ID_COLUMN, DataType::Integer).primary_key());
        }
        all.extend(columns);
        Self {
            name: name.into(),
            schema: Schema::new(all),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.schema
            .find_column_index(column)
            .ok_or_else(|| OrmError::ColumnNotFound(column.to_string(), self.name.clone()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<i64, Row>,
    next_id: i64,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Inserts a row. A NULL id is replaced with the next sequence value.
    pub fn insert(&mut self, mut row: Row) -> Result<i64> {
        let id = match row.first() {
            Some(Value::Integer(id)) => *id,
            Some(Value::Null) => self.next_id,
            other => {
                return Err(OrmError::TypeMismatch(format!(
                    "Table '{}' expects an integer id, got {}",
                    self.schema.name,
                    other.map_or("nothing", Value::type_name)
                )));
            }
        };
        row[0] = Value::Integer(id);
        self.validate_row(&row)?;
        if self.rows.contains_key(&id) {
            return Err(OrmError::ConstraintViolation(format!(
                "Duplicate id {} in table '{}'",
                id, self.schema.name
            )));
        }
        self.check_uniqueness(&row, None)?;

        self.next_id = self.next_id.max(id + 1);
        self.rows.insert(id, row);
        Ok(id)
    }

    /// Replaces a row, returning the previous version.
    pub fn update(&mut self, id: i64, row: Row) -> Result<Option<Row>> {
        if !self.rows.contains_key(&id) {
            return Ok(None);
        }
        self.validate_row(&row)?;
        self.check_uniqueness(&row, Some(id))?;
        Ok(self.rows.insert(id, row))
    }

    pub fn delete(&mut self, id: i64) -> Option<Row> {
        self.rows.remove(&id)
    }

    /// Puts a row back under its original id without constraint checks.
    /// Only used to revert a transaction.
    pub(crate) fn restore(&mut self, id: i64, row: Row) {
        self.rows.insert(id, row);
    }

    pub fn get(&self, id: i64) -> Option<&Row> {
        self.rows.get(&id)
    }

    /// Rows in id order.
    pub fn scan(&self) -> impl Iterator<Item = (i64, &Row)> {
        self.rows.iter().map(|(id, row)| (*id, row))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn validate_row(&self, row: &Row) -> Result<()> {
        let columns = self.schema.schema().columns();
        if row.len() != columns.len() {
            return Err(OrmError::TypeMismatch(format!(
                "Table '{}' expects {} columns, got {}",
                self.schema.name,
                columns.len(),
                row.len()
            )));
        }
        for (column, value) in columns.iter().zip(row.iter()) {
            column.validate(value)?;
        }
        Ok(())
    }

    fn check_uniqueness(&self, row: &Row, ignore_id: Option<i64>) -> Result<()> {
        for (idx, column) in self.schema.schema().columns().iter().enumerate() {
            if !column.unique || row[idx].is_null() {
                continue;
            }
            let taken = self
                .rows
                .iter()
                .any(|(id, other)| Some(*id) != ignore_id && other[idx] == row[idx]);
            if taken {
                return Err(OrmError::ConstraintViolation(format!(
                    "Unique constraint violation: Column '{}' already contains value {}",
                    column.name, row[idx]
                )));
            }
        }
        Ok(())
    }
}
