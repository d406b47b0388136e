use super::{Catalog, TableSchema};
use crate::core::{OrmError, Result, Row, Value};
use crate::persistence::Persistence;
use crate::query::{AggregateFunction, Aggregate, Assignment, Direction, Select, Update};
use crate::transaction::{Change, TransactionManager};
use std::cmp::Ordering;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Committed state seen by every connected handle. `version` moves on
/// every write that lands here.
#[derive(Debug, Default)]
struct Shared {
    catalog: Catalog,
    version: u64,
}

/// Private copy of the catalog an open transaction reads and writes.
#[derive(Debug)]
struct Workspace {
    catalog: Catalog,
    base_version: u64,
}

/// In-memory store. Each handle owns its transaction state; handles made
/// with [`connect`](Self::connect) share the same committed tables.
///
/// The outermost `begin()` takes a snapshot of the committed catalog and
/// the transaction works on that copy, so other handles never see its
/// writes before `commit()`. Commit installs the copy only if nothing else
/// was committed since the snapshot was taken (first committer wins);
/// otherwise it fails with a retryable [`OrmError::Transaction`] and the
/// copy is discarded. Writes outside a transaction apply directly.
pub struct InMemoryStorage {
    shared: Arc<RwLock<Shared>>,
    workspace: Option<Workspace>,
    transactions: TransactionManager,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::from_catalog(Catalog::new())
    }

    pub fn from_catalog(catalog: Catalog) -> Self {
        Self {
            shared: Arc::new(RwLock::new(Shared { catalog, version: 0 })),
            workspace: None,
            transactions: TransactionManager::new(),
        }
    }

    /// Opens another handle on the same data with its own transaction state.
    pub fn connect(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            workspace: None,
            transactions: TransactionManager::new(),
        }
    }

    /// Copy of the catalog as this handle sees it, for snapshots.
    pub fn catalog(&self) -> Result<Catalog> {
        self.read(|catalog| Ok(catalog.clone()))
    }

    pub fn list_tables(&self) -> Result<Vec<String>> {
        self.read(|catalog| Ok(catalog.table_names()))
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        self.read(|catalog| Ok(catalog.table(table)?.row_count()))
    }

    pub fn transaction_depth(&self) -> usize {
        self.transactions.depth()
    }

    fn read<T>(&self, f: impl FnOnce(&Catalog) -> Result<T>) -> Result<T> {
        match &self.workspace {
            Some(workspace) => f(&workspace.catalog),
            None => f(&self.shared.read()?.catalog),
        }
    }

    fn write<T>(&mut self, f: impl FnOnce(&mut Catalog) -> Result<T>) -> Result<T> {
        match &mut self.workspace {
            Some(workspace) => f(&mut workspace.catalog),
            None => {
                let mut shared = self.shared.write()?;
                let result = f(&mut shared.catalog);
                shared.version += 1;
                result
            }
        }
    }

    /// Reverts a savepoint inside the working copy.
    fn revert(&mut self, undo: Vec<Change>) -> Result<()> {
        let workspace = self.workspace.as_mut().ok_or_else(|| {
            OrmError::Transaction("Cannot roll back: no working copy is open".into())
        })?;
        let catalog = &mut workspace.catalog;
        for change in undo {
            match change {
                Change::InsertRow { table, id } => {
                    catalog.table_mut(&table)?.delete(id);
                }
                Change::UpdateRow { table, id, old_row } | Change::DeleteRow { table, id, old_row } => {
                    catalog.table_mut(&table)?.restore(id, old_row);
                }
                Change::CreateTable { name } => {
                    catalog.drop_table(&name)?;
                }
            }
        }
        Ok(())
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InMemoryStorage {
    fn drop(&mut self) {
        if self.transactions.is_active() {
            warn!(
                txn = ?self.transactions.current_id(),
                changes = self.transactions.pending_changes(),
                "handle dropped inside an open transaction, discarding its changes"
            );
        }
    }
}

fn sort_rows(rows: &mut [Row], idx: usize, direction: Direction) -> Result<()> {
    // Every non-NULL value must compare with the first one, which makes
    // the whole column mutually comparable before the sort starts.
    if let Some(first) = rows.iter().map(|row| &row[idx]).find(|v| !v.is_null()) {
        for row in rows.iter() {
            first.compare(&row[idx])?;
        }
    }
    rows.sort_by(|a, b| {
        let ord = a[idx].compare(&b[idx]).unwrap_or(Ordering::Equal);
        match direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    });
    Ok(())
}

impl Persistence for InMemoryStorage {
    fn create_table(&mut self, schema: TableSchema) -> Result<()> {
        let name = schema.name().to_string();
        debug!(table = %name, "CREATE TABLE");
        self.write(|catalog| catalog.create_table(schema))?;
        self.transactions.record(Change::CreateTable { name });
        Ok(())
    }

    fn has_table(&self, table: &str) -> Result<bool> {
        self.read(|catalog| Ok(catalog.has_table(table)))
    }

    fn table_schema(&self, table: &str) -> Result<TableSchema> {
        self.read(|catalog| Ok(catalog.table(table)?.schema().clone()))
    }

    fn insert(&mut self, table: &str, row: Row) -> Result<i64> {
        let id = self.write(|catalog| catalog.table_mut(table)?.insert(row))?;
        debug!(table, id, "INSERT");
        self.transactions.record(Change::InsertRow {
            table: table.to_string(),
            id,
        });
        Ok(id)
    }

    fn fetch(&self, table: &str, id: i64) -> Result<Option<Row>> {
        self.read(|catalog| Ok(catalog.table(table)?.get(id).cloned()))
    }

    fn select(&self, query: &Select) -> Result<Vec<Row>> {
        debug!(statement = %query, "execute");
        self.read(|catalog| {
            let table = catalog.table(&query.table)?;
            let schema = table.schema();

            let mut rows = Vec::new();
            for (_, row) in table.scan() {
                if query.filter.matches(row, schema.schema(), schema.name())? {
                    rows.push(row.clone());
                }
            }

            if let Some((column, direction)) = &query.order_by {
                let idx = schema.column_index(column)?;
                sort_rows(&mut rows, idx, *direction)?;
            }
            if let Some(limit) = query.limit {
                rows.truncate(limit);
            }
            Ok(rows)
        })
    }

    fn aggregate(&self, query: &Aggregate) -> Result<Option<Value>> {
        debug!(statement = %query, "execute");
        self.read(|catalog| {
            let table = catalog.table(&query.table)?;
            let idx = table.schema().column_index(&query.column)?;

            let mut best: Option<&Value> = None;
            for (_, row) in table.scan() {
                let value = &row[idx];
                if value.is_null() {
                    continue;
                }
                best = match best {
                    None => Some(value),
                    Some(current) => {
                        let ord = value.compare(current)?;
                        let better = match query.function {
                            AggregateFunction::Min => ord == Ordering::Less,
                            AggregateFunction::Max => ord == Ordering::Greater,
                        };
                        Some(if better { value } else { current })
                    }
                };
            }
            Ok(best.cloned())
        })
    }

    fn update_where(&mut self, update: &Update) -> Result<usize> {
        debug!(statement = %update, "execute");
        let applied = self.write(|catalog| {
            let table = catalog.table_mut(&update.table)?;
            let schema = table.schema().clone();
            let idx = schema.column_index(&update.column)?;

            // Compute every new row before touching any, so a type error
            // or an overflow leaves the table as it was.
            let mut pending = Vec::new();
            for (id, row) in table.scan() {
                if !update.filter.matches(row, schema.schema(), schema.name())? {
                    continue;
                }
                let mut new_row = row.clone();
                new_row[idx] = match (&update.assignment, &row[idx]) {
                    (Assignment::Set(value), _) => value.clone(),
                    (Assignment::Shift(_), Value::Null) => Value::Null,
                    (Assignment::Shift(delta), Value::Integer(current)) => current
                        .checked_add(*delta)
                        .map(Value::Integer)
                        .ok_or_else(|| {
                            OrmError::ConstraintViolation(format!(
                                "Shifting '{}' of row {} by {} overflows",
                                update.column, id, delta
                            ))
                        })?,
                    (Assignment::Shift(_), other) => {
                        return Err(OrmError::TypeMismatch(format!(
                            "Cannot shift column '{}' of type {}",
                            update.column,
                            other.type_name()
                        )));
                    }
                };
                pending.push((id, new_row));
            }

            let mut applied = Vec::new();
            for (id, new_row) in pending {
                if let Some(old_row) = table.update(id, new_row)? {
                    applied.push((id, old_row));
                }
            }
            Ok(applied)
        })?;

        let changed = applied.len();
        for (id, old_row) in applied {
            self.transactions.record(Change::UpdateRow {
                table: update.table.clone(),
                id,
                old_row,
            });
        }
        debug!(rows = changed, "bulk update applied");
        Ok(changed)
    }

    fn update_by_id(&mut self, table: &str, id: i64, column: &str, value: Value) -> Result<()> {
        debug!(table, id, column, value = %value, "UPDATE by id");
        let mut row = self
            .fetch(table, id)?
            .ok_or_else(|| OrmError::EntityNotFound {
                entity: table.to_string(),
                id,
            })?;
        let idx = self.table_schema(table)?.column_index(column)?;
        row[idx] = value;
        self.replace(table, id, row)
    }

    fn replace(&mut self, table: &str, id: i64, row: Row) -> Result<()> {
        let old_row = self
            .write(|catalog| catalog.table_mut(table)?.update(id, row))?
            .ok_or_else(|| OrmError::EntityNotFound {
                entity: table.to_string(),
                id,
            })?;
        self.transactions.record(Change::UpdateRow {
            table: table.to_string(),
            id,
            old_row,
        });
        Ok(())
    }

    fn delete(&mut self, table: &str, id: i64) -> Result<bool> {
        debug!(table, id, "DELETE");
        let removed = self.write(|catalog| Ok(catalog.table_mut(table)?.delete(id)))?;
        match removed {
            Some(old_row) => {
                self.transactions.record(Change::DeleteRow {
                    table: table.to_string(),
                    id,
                    old_row,
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn begin(&mut self) -> Result<()> {
        if !self.transactions.is_active() {
            let shared = self.shared.read()?;
            let workspace = Workspace {
                catalog: shared.catalog.clone(),
                base_version: shared.version,
            };
            drop(shared);
            self.workspace = Some(workspace);
        }
        let depth = self.transactions.begin();
        debug!(depth, txn = ?self.transactions.current_id(), "BEGIN");
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let txn = self.transactions.current_id();
        let writes = self.transactions.pending_changes();
        let state = self.transactions.commit()?;
        if state.is_active() {
            debug!(?txn, depth = self.transactions.depth(), "RELEASE SAVEPOINT");
            return Ok(());
        }

        let workspace = self.workspace.take().ok_or_else(|| {
            OrmError::Transaction("Cannot commit: no working copy is open".into())
        })?;
        if writes == 0 {
            debug!(?txn, ?state, "COMMIT read-only");
            return Ok(());
        }

        let mut shared = self.shared.write()?;
        if shared.version != workspace.base_version {
            warn!(
                ?txn,
                base = workspace.base_version,
                current = shared.version,
                "COMMIT conflict, changes discarded"
            );
            return Err(OrmError::Transaction(format!(
                "Cannot commit: the store changed since the transaction began (version {} is now {})",
                workspace.base_version, shared.version
            )));
        }
        shared.catalog = workspace.catalog;
        shared.version += 1;
        debug!(?txn, ?state, writes, version = shared.version, "COMMIT");
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        let txn = self.transactions.current_id();
        let (state, undo) = self.transactions.rollback()?;
        warn!(?txn, ?state, changes = undo.len(), "ROLLBACK");
        if state.is_active() {
            self.revert(undo)
        } else {
            self.workspace = None;
            Ok(())
        }
    }

    fn in_transaction(&self) -> bool {
        self.transactions.is_active()
    }
}
