//! The persistence collaborator the entity layer and behaviors talk to.

use crate::core::{Result, Row, Value};
use crate::query::{Aggregate, Select, Update};
use crate::storage::TableSchema;

/// Storage operations needed by the entity manager and its behaviors.
///
/// Object safe: behaviors receive `&mut dyn Persistence`.
pub trait Persistence {
    fn create_table(&mut self, schema: TableSchema) -> Result<()>;

    fn has_table(&self, table: &str) -> Result<bool>;

    fn table_schema(&self, table: &str) -> Result<TableSchema>;

    /// Inserts a row whose first value is the id (NULL to auto-assign).
    /// Returns the stored id.
    fn insert(&mut self, table: &str, row: Row) -> Result<i64>;

    /// Reloads a single row from storage.
    fn fetch(&self, table: &str, id: i64) -> Result<Option<Row>>;

    fn select(&self, query: &Select) -> Result<Vec<Row>>;

    /// MIN/MAX over non-NULL values. `None` when there are none.
    fn aggregate(&self, query: &Aggregate) -> Result<Option<Value>>;

    /// Bulk update by predicate. Returns the number of rows changed.
    fn update_where(&mut self, update: &Update) -> Result<usize>;

    /// Sets one column of one row.
    ///
    /// Fails with `EntityNotFound` when no row has that id.
    fn update_by_id(&mut self, table: &str, id: i64, column: &str, value: Value) -> Result<()>;

    /// Overwrites a whole row. Fails with `EntityNotFound` when absent.
    fn replace(&mut self, table: &str, id: i64, row: Row) -> Result<()>;

    fn delete(&mut self, table: &str, id: i64) -> Result<bool>;

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    fn in_transaction(&self) -> bool;
}

/// Runs `f` inside a transaction: commits on `Ok`, rolls back on `Err`.
///
/// When already inside a transaction this opens a nested level, so a
/// failing inner unit leaves the outer one usable.
pub fn transactional<P, T, F>(store: &mut P, f: F) -> Result<T>
where
    P: Persistence + ?Sized,
    F: FnOnce(&mut P) -> Result<T>,
{
    store.begin()?;
    match f(store) {
        Ok(value) => {
            store.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = store.rollback() {
                tracing::error!(error = %rollback_err, "rollback failed after error: {}", err);
            }
            Err(err)
        }
    }
}
