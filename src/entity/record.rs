use crate::core::{OrmError, Result, Row, Value};
use crate::storage::{ID_COLUMN, TableSchema};
use std::collections::BTreeMap;

/// Old and new value of one changed field.
pub type FieldChange = (Value, Value);

/// In-memory state of one entity.
///
/// Keeps the field values as last loaded from or written to storage, so
/// the manager can compute a change set before an update is flushed.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    entity: String,
    id: Option<i64>,
    values: BTreeMap<String, Value>,
    original: BTreeMap<String, Value>,
}

impl Record {
    /// A new, not yet persisted entity.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            id: None,
            values: BTreeMap::new(),
            original: BTreeMap::new(),
        }
    }

    /// Rebuilds a clean record from a stored row.
    pub fn from_row(schema: &TableSchema, row: Row) -> Result<Self> {
        let mut record = Self::new(schema.name());
        record.load(schema, row)?;
        Ok(record)
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// The id, or `InvalidArgument` for an entity that was never saved.
    pub fn require_id(&self) -> Result<i64> {
        self.id.ok_or_else(|| {
            OrmError::InvalidArgument(format!(
                "The {} entity has not been persisted yet.",
                self.entity
            ))
        })
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.values.get(field).and_then(Value::as_i64)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(Value::as_str)
    }

    /// Sets a field. The id column belongs to storage and is rejected.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Result<&mut Self> {
        let field = field.into();
        if field == ID_COLUMN {
            return Err(OrmError::InvalidArgument(format!(
                "The {} of a {} entity is assigned by storage.",
                ID_COLUMN, self.entity
            )));
        }
        self.values.insert(field, value.into());
        Ok(self)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fields whose value differs from the last loaded state.
    pub fn change_set(&self) -> BTreeMap<String, FieldChange> {
        let mut changes = BTreeMap::new();
        for (field, value) in &self.values {
            let old = self.original.get(field).cloned().unwrap_or(Value::Null);
            if old != *value {
                changes.insert(field.clone(), (old, value.clone()));
            }
        }
        changes
    }

    pub fn is_dirty(&self) -> bool {
        !self.change_set().is_empty()
    }

    /// Lays the record out as a row of `schema`. Unset fields are NULL.
    pub fn to_row(&self, schema: &TableSchema) -> Result<Row> {
        for field in self.values.keys() {
            schema.column_index(field)?;
        }
        Ok(schema
            .schema()
            .columns()
            .iter()
            .map(|column| {
                if column.name == ID_COLUMN {
                    Value::from(self.id)
                } else {
                    self.values.get(&column.name).cloned().unwrap_or(Value::Null)
                }
            })
            .collect())
    }

    /// Replaces the whole state with a stored row, discarding unsaved
    /// changes.
    pub(crate) fn load(&mut self, schema: &TableSchema, row: Row) -> Result<()> {
        let columns = schema.schema().columns();
        if row.len() != columns.len() {
            return Err(OrmError::TypeMismatch(format!(
                "Row for '{}' has {} values, schema has {} columns",
                schema.name(),
                row.len(),
                columns.len()
            )));
        }
        let mut values = BTreeMap::new();
        let mut id = None;
        for (column, value) in columns.iter().zip(row) {
            if column.name == ID_COLUMN {
                id = value.as_i64();
            } else {
                values.insert(column.name.clone(), value);
            }
        }
        self.id = id;
        self.original = values.clone();
        self.values = values;
        Ok(())
    }

    pub(crate) fn assign_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    /// Marks the current values as the stored state.
    pub(crate) fn mark_clean(&mut self) {
        self.original = self.values.clone();
    }

    /// Forgets the identity after removal; the record becomes new again.
    pub(crate) fn detach(&mut self) {
        self.id = None;
        self.original.clear();
    }
}
