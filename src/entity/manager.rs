use super::{LifecycleEvent, Record};
use crate::behavior::{BehaviorSet, SortableRepository};
use crate::core::{OrmError, Result};
use crate::persistence::{Persistence, transactional};
use crate::query::{Direction, Select};
use crate::schema::EntitySchema;
use crate::storage::{ID_COLUMN, InMemoryStorage, TableSchema};
use std::collections::BTreeMap;
use tracing::{debug, info};

struct RegisteredEntity {
    schema: EntitySchema,
    table: TableSchema,
    behaviors: BehaviorSet,
}

/// Saves, removes and loads entities of registered types, running each
/// type's behaviors around every write.
///
/// Each write is one transaction on the underlying store: the behavior
/// hooks and the row write commit or roll back together.
pub struct EntityManager<P: Persistence = InMemoryStorage> {
    store: P,
    entities: BTreeMap<String, RegisteredEntity>,
}

impl<P: Persistence> EntityManager<P> {
    pub fn new(store: P) -> Self {
        Self {
            store,
            entities: BTreeMap::new(),
        }
    }

    /// Registers an entity type and creates its table.
    ///
    /// Behavior options are validated here. When the table already exists
    /// (e.g. restored from a snapshot) its layout must match.
    pub fn register(&mut self, schema: EntitySchema) -> Result<()> {
        schema.validate()?;
        if self.entities.contains_key(&schema.name) {
            return Err(OrmError::Configuration(format!(
                "Entity '{}' is already registered.",
                schema.name
            )));
        }

        let behaviors = BehaviorSet::build(&schema.name, &schema.behaviors)?;
        let mut columns = schema.columns.clone();
        for column in behaviors.columns() {
            match columns.iter().find(|c| c.name == column.name) {
                // Declaring the behavior column by hand is fine if it agrees.
                Some(declared) if declared.data_type == column.data_type => {}
                Some(declared) => {
                    return Err(OrmError::Configuration(format!(
                        "Column '{}' of entity '{}' must be {}, found {}.",
                        column.name, schema.name, column.data_type, declared.data_type
                    )));
                }
                None => columns.push(column),
            }
        }
        let table = TableSchema::new(&schema.name, columns);

        if self.store.has_table(&schema.name)? {
            let existing = self.store.table_schema(&schema.name)?;
            if existing != table {
                return Err(OrmError::Configuration(format!(
                    "Stored table '{}' does not match its entity schema.",
                    schema.name
                )));
            }
        } else {
            self.store.create_table(table.clone())?;
        }

        info!(entity = %schema.name, behaviors = ?behaviors.names(), "registered entity");
        self.entities.insert(
            schema.name.clone(),
            RegisteredEntity {
                schema,
                table,
                behaviors,
            },
        );
        Ok(())
    }

    /// A fresh, unsaved record of a registered type.
    pub fn create(&self, entity: &str) -> Result<Record> {
        self.registered(entity)?;
        Ok(Record::new(entity))
    }

    /// Inserts a new record or writes back a changed one.
    ///
    /// On failure the store is rolled back and the record is left exactly
    /// as it was passed in.
    pub fn save(&mut self, record: &mut Record) -> Result<()> {
        let Self { store, entities } = self;
        let entity = lookup(entities, record.entity())?;
        if !record.is_new() && !record.is_dirty() {
            return Ok(());
        }

        let before = record.clone();
        let result = transactional(store, |store| {
            let table = entity.table.name();
            if record.is_new() {
                for behavior in entity.behaviors.iter() {
                    behavior.on_event(LifecycleEvent::PrePersist, record, store)?;
                }
                let id = store.insert(table, record.to_row(&entity.table)?)?;
                record.assign_id(id);
                debug!(entity = table, id, "persisted");
            } else {
                let id = record.require_id()?;
                for behavior in entity.behaviors.iter() {
                    behavior.on_event(LifecycleEvent::PreUpdate, record, store)?;
                }
                store.replace(table, id, record.to_row(&entity.table)?)?;
                debug!(entity = table, id, "updated");
            }
            Ok(())
        });

        match result {
            Ok(()) => {
                record.mark_clean();
                Ok(())
            }
            Err(err) => {
                *record = before;
                Err(err)
            }
        }
    }

    /// Deletes a persisted record. The record becomes new again.
    pub fn remove(&mut self, record: &mut Record) -> Result<()> {
        let Self { store, entities } = self;
        let entity = lookup(entities, record.entity())?;
        let id = record.require_id()?;
        let table = entity.table.name();

        transactional(store, |store| {
            for behavior in entity.behaviors.iter() {
                behavior.on_event(LifecycleEvent::PreRemove, record, store)?;
            }
            if !store.delete(table, id)? {
                return Err(OrmError::EntityNotFound {
                    entity: table.to_string(),
                    id,
                });
            }
            Ok(())
        })?;

        record.detach();
        debug!(entity = table, id, "removed");
        Ok(())
    }

    /// Reloads a persisted record from storage, dropping unsaved changes.
    pub fn refresh(&self, record: &mut Record) -> Result<()> {
        let entity = self.registered(record.entity())?;
        let id = record.require_id()?;
        let row = self
            .store
            .fetch(entity.table.name(), id)?
            .ok_or_else(|| OrmError::EntityNotFound {
                entity: record.entity().to_string(),
                id,
            })?;
        record.load(&entity.table, row)
    }

    pub fn find(&self, entity: &str, id: i64) -> Result<Option<Record>> {
        let registered = self.registered(entity)?;
        self.store
            .fetch(entity, id)?
            .map(|row| Record::from_row(&registered.table, row))
            .transpose()
    }

    /// Every record of `entity`, in id order.
    pub fn find_all(&self, entity: &str) -> Result<Vec<Record>> {
        let registered = self.registered(entity)?;
        self.store
            .select(&Select::from(entity).order_by(ID_COLUMN, Direction::Asc))?
            .into_iter()
            .map(|row| Record::from_row(&registered.table, row))
            .collect()
    }

    /// Ordering operations of a sortable entity type.
    pub fn sortable(&mut self, entity: &str) -> Result<SortableRepository<'_, P>> {
        let engine = self
            .registered(entity)?
            .behaviors
            .sortable()
            .cloned()
            .ok_or_else(|| {
                OrmError::Configuration(format!("Entity '{}' is not sortable.", entity))
            })?;
        Ok(SortableRepository::new(self, engine))
    }

    pub fn schema(&self, entity: &str) -> Result<&EntitySchema> {
        Ok(&self.registered(entity)?.schema)
    }

    pub fn table_schema(&self, entity: &str) -> Result<&TableSchema> {
        Ok(&self.registered(entity)?.table)
    }

    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.keys().map(String::as_str).collect()
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut P {
        &mut self.store
    }

    pub fn into_store(self) -> P {
        self.store
    }

    fn registered(&self, entity: &str) -> Result<&RegisteredEntity> {
        lookup(&self.entities, entity)
    }
}

impl Default for EntityManager<InMemoryStorage> {
    fn default() -> Self {
        Self::new(InMemoryStorage::new())
    }
}

fn lookup<'a>(
    entities: &'a BTreeMap<String, RegisteredEntity>,
    entity: &str,
) -> Result<&'a RegisteredEntity> {
    entities
        .get(entity)
        .ok_or_else(|| OrmError::UnknownEntity(entity.to_string()))
}
