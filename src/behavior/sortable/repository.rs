use super::Sortable;
use crate::core::Result;
use crate::entity::{EntityManager, Record};
use crate::persistence::Persistence;
use std::sync::Arc;

/// Ordering operations for one sortable entity type, bound to a manager.
///
/// Obtained from [`EntityManager::sortable`].
pub struct SortableRepository<'a, P: Persistence> {
    manager: &'a mut EntityManager<P>,
    engine: Arc<Sortable>,
}

impl<'a, P: Persistence> SortableRepository<'a, P> {
    pub(crate) fn new(manager: &'a mut EntityManager<P>, engine: Arc<Sortable>) -> Self {
        Self { manager, engine }
    }

    pub fn engine(&self) -> &Sortable {
        &self.engine
    }

    pub fn min_position(&self) -> Result<Option<i64>> {
        self.engine.min_position(self.manager.store())
    }

    pub fn max_position(&self) -> Result<Option<i64>> {
        self.engine.max_position(self.manager.store())
    }

    pub fn is_first(&self, record: &Record) -> Result<bool> {
        self.engine.is_first(self.manager.store(), record)
    }

    pub fn is_last(&self, record: &Record) -> Result<bool> {
        self.engine.is_last(self.manager.store(), record)
    }

    pub fn next(&self, record: &Record) -> Result<Option<Record>> {
        self.engine.next(self.manager.store(), record)
    }

    pub fn previous(&self, record: &Record) -> Result<Option<Record>> {
        self.engine.previous(self.manager.store(), record)
    }

    pub fn swap_with(&mut self, record: &mut Record, other: &mut Record) -> Result<()> {
        self.engine.swap_with(self.manager.store_mut(), record, other)
    }

    pub fn move_up(&mut self, record: &mut Record) -> Result<()> {
        self.engine.move_up(self.manager.store_mut(), record)
    }

    pub fn move_down(&mut self, record: &mut Record) -> Result<()> {
        self.engine.move_down(self.manager.store_mut(), record)
    }

    pub fn ordered(&self) -> Result<Vec<Record>> {
        self.engine.ordered(self.manager.store())
    }

    pub fn compact(&mut self) -> Result<usize> {
        self.engine.compact(self.manager.store_mut())
    }
}
