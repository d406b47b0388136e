// ============================================================================
// Sortable ordering engine
// ============================================================================
//
// Keeps an integer column of one entity type as a dense 1..N ranking.
// Every multi-row change is a single bulk UPDATE or a pair of id updates
// wrapped in one transaction.
//
// ============================================================================

use super::{NewPosition, SortableConfig};
use crate::behavior::Behavior;
use crate::core::{Column, DataType, OrmError, Result, Value};
use crate::entity::{LifecycleEvent, Record};
use crate::persistence::{Persistence, transactional};
use crate::query::{Aggregate, Direction, Filter, Select, Update};
use crate::storage::ID_COLUMN;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct Sortable {
    entity: String,
    config: SortableConfig,
}

impl Sortable {
    pub fn new(entity: &str, config: SortableConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            entity: entity.to_string(),
            config,
        })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn column(&self) -> &str {
        &self.config.column
    }

    pub fn config(&self) -> &SortableConfig {
        &self.config
    }

    /// Smallest position in the collection, `None` when it is empty.
    pub fn min_position(&self, store: &dyn Persistence) -> Result<Option<i64>> {
        self.scalar(store, Aggregate::min(&self.entity, self.column()))
    }

    /// Largest position in the collection, `None` when it is empty.
    pub fn max_position(&self, store: &dyn Persistence) -> Result<Option<i64>> {
        self.scalar(store, Aggregate::max(&self.entity, self.column()))
    }

    pub fn is_first(&self, store: &dyn Persistence, record: &Record) -> Result<bool> {
        let position = self.position_of(record)?;
        Ok(self.min_position(store)? == Some(position))
    }

    pub fn is_last(&self, store: &dyn Persistence, record: &Record) -> Result<bool> {
        let position = self.position_of(record)?;
        Ok(self.max_position(store)? == Some(position))
    }

    /// The entity right after `record`, or `None` when it is the last.
    pub fn next(&self, store: &dyn Persistence, record: &Record) -> Result<Option<Record>> {
        let position = self.position_of(record)?;
        self.neighbor(
            store,
            Filter::Gt(self.column().to_string(), Value::Integer(position)),
            Direction::Asc,
        )
    }

    /// The entity right before `record`, or `None` when it is the first.
    pub fn previous(&self, store: &dyn Persistence, record: &Record) -> Result<Option<Record>> {
        let position = self.position_of(record)?;
        self.neighbor(
            store,
            Filter::Lt(self.column().to_string(), Value::Integer(position)),
            Direction::Desc,
        )
    }

    /// Exchanges the positions of two entities in one transaction.
    ///
    /// Both records are reloaded from storage afterwards, so unsaved edits
    /// on either are discarded. On failure nothing is written and neither
    /// record is touched.
    pub fn swap_with(
        &self,
        store: &mut dyn Persistence,
        record: &mut Record,
        other: &mut Record,
    ) -> Result<()> {
        self.check_entity(other)?;
        let old_position = self.position_of(record)?;
        let new_position = self.position_of(other)?;
        let record_id = record.require_id()?;
        let other_id = other.require_id()?;

        let table = self.entity.as_str();
        let column = self.column();
        let schema = store.table_schema(table)?;
        debug!(
            entity = table,
            record_id, other_id, old_position, new_position, "swapping positions"
        );

        let (record_row, other_row) = transactional(store, |store| {
            store.update_by_id(table, record_id, column, Value::Integer(new_position))?;
            store.update_by_id(table, other_id, column, Value::Integer(old_position))?;
            let record_row = self.fetch(store, record_id)?;
            let other_row = self.fetch(store, other_id)?;
            Ok((record_row, other_row))
        })?;

        record.load(&schema, record_row)?;
        other.load(&schema, other_row)?;
        Ok(())
    }

    /// Swaps `record` with its previous entity.
    pub fn move_up(&self, store: &mut dyn Persistence, record: &mut Record) -> Result<()> {
        if self.is_first(store, record)? {
            return Err(OrmError::PreconditionFailed("The entity is the first.".into()));
        }
        let mut previous = self.previous(store, record)?.ok_or_else(|| {
            OrmError::PreconditionFailed("The entity has no previous entity.".into())
        })?;
        self.swap_with(store, record, &mut previous)
    }

    /// Swaps `record` with its next entity.
    pub fn move_down(&self, store: &mut dyn Persistence, record: &mut Record) -> Result<()> {
        if self.is_last(store, record)? {
            return Err(OrmError::PreconditionFailed("The entity is the last.".into()));
        }
        let mut next = self.next(store, record)?.ok_or_else(|| {
            OrmError::PreconditionFailed("The entity has no next entity.".into())
        })?;
        self.swap_with(store, record, &mut next)
    }

    /// Pre-persist/pre-update hook.
    ///
    /// A new entity goes to the top or bottom and everything at or after
    /// that slot shifts by one. An updated entity whose position changed
    /// moves there, and every other entity between its old and new slot
    /// shifts one step toward the old slot. Any other update is a no-op.
    pub fn assign_position_on_save(
        &self,
        store: &mut dyn Persistence,
        record: &mut Record,
    ) -> Result<()> {
        self.check_entity(record)?;
        let column = self.column();

        if record.is_new() {
            let position = match self.config.new_position {
                NewPosition::Top => 1,
                NewPosition::Bottom => self
                    .max_position(store)?
                    .unwrap_or(0)
                    .checked_add(1)
                    .ok_or_else(|| {
                        OrmError::ConstraintViolation(format!(
                            "No {} left after the last {} entity.",
                            column, self.entity
                        ))
                    })?,
            };
            record.set(column, position)?;
            let shifted = store.update_where(
                &Update::shift(&self.entity, column, 1)
                    .filter(Filter::Gte(column.to_string(), Value::Integer(position))),
            )?;
            debug!(entity = %self.entity, position, shifted, "positioned new entity");
            return Ok(());
        }

        let Some((old, new)) = record.change_set().remove(column) else {
            trace!(entity = %self.entity, "position untouched, nothing to shift");
            return Ok(());
        };
        let id = record.require_id()?;
        let (Some(old), Some(new)) = (old.as_i64(), new.as_i64()) else {
            return Err(OrmError::InvalidArgument(format!(
                "The {} of a {} entity must be an integer.",
                column, self.entity
            )));
        };
        let max = self.max_position(store)?.unwrap_or(0);
        if !(1..=max).contains(&new) {
            return Err(OrmError::InvalidArgument(format!(
                "The {} {} is out of range 1..={}.",
                column, new, max
            )));
        }

        let delta = if new > old { -1 } else { 1 };
        let shifted = store.update_where(
            &Update::shift(&self.entity, column, delta)
                .filter(Filter::Between(
                    column.to_string(),
                    Value::Integer(old.min(new)),
                    Value::Integer(old.max(new)),
                ))
                .filter(Filter::Ne(ID_COLUMN.to_string(), Value::Integer(id))),
        )?;
        debug!(entity = %self.entity, id, old, new, shifted, "repositioned entity");
        Ok(())
    }

    /// Pre-remove hook. Closes the gap only when `compact_on_delete` is set.
    pub fn release_position(&self, store: &mut dyn Persistence, record: &Record) -> Result<()> {
        if !self.config.compact_on_delete {
            return Ok(());
        }
        self.check_entity(record)?;
        let id = record.require_id()?;
        let Some(row) = store.fetch(&self.entity, id)? else {
            return Ok(());
        };
        let idx = store.table_schema(&self.entity)?.column_index(self.column())?;
        let Some(position) = row[idx].as_i64() else {
            return Ok(());
        };
        store.update_where(
            &Update::shift(&self.entity, self.column(), -1)
                .filter(Filter::Gt(self.column().to_string(), Value::Integer(position))),
        )?;
        Ok(())
    }

    /// Every entity of the collection, first to last.
    pub fn ordered(&self, store: &dyn Persistence) -> Result<Vec<Record>> {
        let schema = store.table_schema(&self.entity)?;
        store
            .select(&Select::from(&self.entity).order_by(self.column(), Direction::Asc))?
            .into_iter()
            .map(|row| Record::from_row(&schema, row))
            .collect()
    }

    /// Renumbers the collection to `1..N`, keeping the current order.
    /// Returns how many entities moved.
    pub fn compact(&self, store: &mut dyn Persistence) -> Result<usize> {
        let records = self.ordered(store)?;
        let table = self.entity.as_str();
        let column = self.column();
        let changed = transactional(store, |store| {
            let mut changed = 0;
            for (expected, record) in (1..).zip(&records) {
                if record.get_i64(column) != Some(expected) {
                    store.update_by_id(table, record.require_id()?, column, Value::Integer(expected))?;
                    changed += 1;
                }
            }
            Ok(changed)
        })?;
        debug!(entity = table, changed, "compacted positions");
        Ok(changed)
    }

    fn scalar(&self, store: &dyn Persistence, query: Aggregate) -> Result<Option<i64>> {
        match store.aggregate(&query)? {
            None => Ok(None),
            Some(Value::Integer(value)) => Ok(Some(value)),
            Some(other) => Err(OrmError::TypeMismatch(format!(
                "Column '{}' holds {}, expected INTEGER",
                query.column,
                other.type_name()
            ))),
        }
    }

    fn neighbor(
        &self,
        store: &dyn Persistence,
        filter: Filter,
        direction: Direction,
    ) -> Result<Option<Record>> {
        let query = Select::from(&self.entity)
            .filter(filter)
            .order_by(self.column(), direction)
            .limit(1);
        let schema = store.table_schema(&self.entity)?;
        store
            .select(&query)?
            .into_iter()
            .next()
            .map(|row| Record::from_row(&schema, row))
            .transpose()
    }

    fn fetch(&self, store: &dyn Persistence, id: i64) -> Result<crate::core::Row> {
        store.fetch(&self.entity, id)?.ok_or_else(|| OrmError::EntityNotFound {
            entity: self.entity.clone(),
            id,
        })
    }

    fn check_entity(&self, record: &Record) -> Result<()> {
        if record.entity() != self.entity {
            return Err(OrmError::InvalidArgument(format!(
                "The entity is not an instance of {}.",
                self.entity
            )));
        }
        Ok(())
    }

    fn position_of(&self, record: &Record) -> Result<i64> {
        self.check_entity(record)?;
        record.require_id()?;
        record.get_i64(self.column()).ok_or_else(|| {
            OrmError::InvalidArgument(format!(
                "The {} entity has no {}.",
                self.entity,
                self.column()
            ))
        })
    }
}

impl Behavior for Sortable {
    fn name(&self) -> &'static str {
        "sortable"
    }

    fn columns(&self) -> Vec<Column> {
        vec![Column::new(self.column(), DataType::Integer)]
    }

    fn on_event(
        &self,
        event: LifecycleEvent,
        record: &mut Record,
        store: &mut dyn Persistence,
    ) -> Result<()> {
        trace!(entity = %self.entity, %event, "sortable hook");
        match event {
            LifecycleEvent::PrePersist | LifecycleEvent::PreUpdate => {
                self.assign_position_on_save(store, record)
            }
            LifecycleEvent::PreRemove => self.release_position(store, record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryStorage, TableSchema};

    fn setup(config: SortableConfig) -> (Sortable, InMemoryStorage) {
        let engine = Sortable::new("Sortable", config).unwrap();
        let mut store = InMemoryStorage::new();
        let mut columns = vec![Column::new("title", DataType::Text)];
        columns.extend(engine.columns());
        store
            .create_table(TableSchema::new("Sortable", columns))
            .unwrap();
        (engine, store)
    }

    fn insert(engine: &Sortable, store: &mut InMemoryStorage) -> Record {
        let mut record = Record::new("Sortable");
        record.set("title", "foo").unwrap();
        engine.assign_position_on_save(store, &mut record).unwrap();
        let schema = store.table_schema("Sortable").unwrap();
        let id = store
            .insert("Sortable", record.to_row(&schema).unwrap())
            .unwrap();
        record.assign_id(id);
        record.mark_clean();
        record
    }

    fn positions(engine: &Sortable, store: &InMemoryStorage) -> Vec<(i64, i64)> {
        engine
            .ordered(store)
            .unwrap()
            .iter()
            .map(|r| (r.id().unwrap(), r.get_i64("position").unwrap()))
            .collect()
    }

    #[test]
    fn test_bottom_insert_appends() {
        let (engine, mut store) = setup(SortableConfig::default());
        for i in 1..=4 {
            let record = insert(&engine, &mut store);
            assert_eq!(record.get_i64("position"), Some(i));
        }
    }

    #[test]
    fn test_top_insert_shifts_existing_down() {
        let (engine, mut store) = setup(SortableConfig::new().new_position(NewPosition::Top));
        for _ in 0..3 {
            assert_eq!(insert(&engine, &mut store).get_i64("position"), Some(1));
        }
        assert_eq!(positions(&engine, &store), vec![(3, 1), (2, 2), (1, 3)]);
    }

    #[test]
    fn test_untouched_update_does_not_shift() {
        let (engine, mut store) = setup(SortableConfig::default());
        let mut first = insert(&engine, &mut store);
        insert(&engine, &mut store);
        first.set("title", "bar").unwrap();
        engine.assign_position_on_save(&mut store, &mut first).unwrap();
        assert_eq!(positions(&engine, &store), vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn test_move_down_shifts_window_up() {
        let (engine, mut store) = setup(SortableConfig::default());
        let mut records: Vec<Record> = (0..5).map(|_| insert(&engine, &mut store)).collect();
        records[1].set("position", 4).unwrap();
        engine
            .assign_position_on_save(&mut store, &mut records[1])
            .unwrap();
        let schema = store.table_schema("Sortable").unwrap();
        store
            .replace("Sortable", 2, records[1].to_row(&schema).unwrap())
            .unwrap();
        assert_eq!(
            positions(&engine, &store),
            vec![(1, 1), (3, 2), (4, 3), (2, 4), (5, 5)]
        );
    }

    #[test]
    fn test_bottom_insert_after_largest_position_overflows() {
        let (engine, mut store) = setup(SortableConfig::default());
        insert(&engine, &mut store);
        store
            .update_by_id("Sortable", 1, "position", Value::Integer(i64::MAX))
            .unwrap();
        let mut record = Record::new("Sortable");
        let err = engine
            .assign_position_on_save(&mut store, &mut record)
            .unwrap_err();
        assert!(matches!(err, OrmError::ConstraintViolation(_)));
        assert_eq!(record.get("position"), None);
    }

    #[test]
    fn test_out_of_range_position_rejected() {
        let (engine, mut store) = setup(SortableConfig::default());
        let mut record = insert(&engine, &mut store);
        insert(&engine, &mut store);
        record.set("position", 3).unwrap();
        let err = engine
            .assign_position_on_save(&mut store, &mut record)
            .unwrap_err();
        assert!(matches!(err, OrmError::InvalidArgument(_)));
        record.set("position", 0).unwrap();
        assert!(engine.assign_position_on_save(&mut store, &mut record).is_err());
    }

    #[test]
    fn test_neighbors_of_unsaved_entity_are_rejected() {
        let (engine, store) = setup(SortableConfig::default());
        let record = Record::new("Sortable");
        assert!(matches!(
            engine.next(&store, &record),
            Err(OrmError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_compact_closes_gaps() {
        let (engine, mut store) = setup(SortableConfig::default());
        for _ in 0..4 {
            insert(&engine, &mut store);
        }
        store.delete("Sortable", 2).unwrap();
        assert_eq!(engine.compact(&mut store).unwrap(), 2);
        assert_eq!(positions(&engine, &store), vec![(1, 1), (3, 2), (4, 3)]);
        assert_eq!(engine.compact(&mut store).unwrap(), 0);
    }

    #[test]
    fn test_custom_column() {
        let (engine, mut store) = setup(SortableConfig::new().column("rank"));
        let record = insert(&engine, &mut store);
        assert_eq!(record.get_i64("rank"), Some(1));
        assert_eq!(engine.max_position(&store).unwrap(), Some(1));
    }
}
