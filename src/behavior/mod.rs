//! Pluggable entity behaviors.
//!
//! A behavior contributes columns to its entity's table and reacts to
//! lifecycle events. Each one is a plain type implementing [`Behavior`];
//! the entity manager holds them per registered entity.

pub mod sortable;

pub use sortable::{NewPosition, Sortable, SortableConfig, SortableRepository};

use crate::core::{Column, Result};
use crate::entity::{LifecycleEvent, Record};
use crate::persistence::Persistence;
use crate::schema::BehaviorConfig;
use std::fmt;
use std::sync::Arc;

pub trait Behavior: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Columns this behavior adds to the entity's table.
    fn columns(&self) -> Vec<Column>;

    fn on_event(
        &self,
        event: LifecycleEvent,
        record: &mut Record,
        store: &mut dyn Persistence,
    ) -> Result<()>;
}

/// Behaviors built for one entity.
#[derive(Debug, Clone, Default)]
pub struct BehaviorSet {
    all: Vec<Arc<dyn Behavior>>,
    sortable: Option<Arc<Sortable>>,
}

impl BehaviorSet {
    /// Validates each config and builds its behavior. Any invalid option
    /// fails here, before a table is created.
    pub fn build(entity: &str, configs: &[BehaviorConfig]) -> Result<Self> {
        let mut set = Self::default();
        for config in configs {
            match config {
                BehaviorConfig::Sortable(_) => {
                    let options = config.string_options();
                    let engine = Arc::new(Sortable::new(
                        entity,
                        SortableConfig::from_options(&options)?,
                    )?);
                    if set.sortable.replace(Arc::clone(&engine)).is_some() {
                        return Err(crate::core::OrmError::Configuration(format!(
                            "Entity '{}' declares the sortable behavior twice.",
                            entity
                        )));
                    }
                    set.all.push(engine);
                }
            }
        }
        Ok(set)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Behavior>> {
        self.all.iter()
    }

    pub fn columns(&self) -> Vec<Column> {
        self.all.iter().flat_map(|b| b.columns()).collect()
    }

    pub fn sortable(&self) -> Option<&Arc<Sortable>> {
        self.sortable.as_ref()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.all.iter().map(|b| b.name()).collect()
    }
}
