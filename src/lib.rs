// ============================================================================
// RustSortable Library
// ============================================================================

//! Entity ordering on top of a small transactional in-memory store.
//!
//! Entity types are registered from an [`EntitySchema`]. The sortable
//! behavior adds an integer position column and keeps it a dense `1..N`
//! ranking on every save, and offers navigation and reordering through
//! [`SortableRepository`].
//!
//! ```
//! use rustsortable::prelude::*;
//!
//! # fn main() -> rustsortable::Result<()> {
//! let mut manager: EntityManager = EntityManager::default();
//! manager.register(
//!     EntitySchema::new("Task")
//!         .column(Column::new("title", DataType::Text))
//!         .behavior(BehaviorConfig::sortable()),
//! )?;
//!
//! let mut first = manager.create("Task")?;
//! first.set("title", "write")?;
//! manager.save(&mut first)?;
//!
//! let mut second = manager.create("Task")?;
//! second.set("title", "review")?;
//! manager.save(&mut second)?;
//!
//! manager.sortable("Task")?.move_up(&mut second)?;
//! assert_eq!(second.get_i64("position"), Some(1));
//!
//! // `first` was moved by the swap, so reload it
//! manager.refresh(&mut first)?;
//! assert_eq!(first.get_i64("position"), Some(2));
//! # Ok(())
//! # }
//! ```

pub mod behavior;
pub mod core;
pub mod entity;
pub mod persistence;
pub mod prelude;
pub mod query;
pub mod schema;
pub mod storage;
pub mod transaction;

pub use behavior::{Behavior, NewPosition, Sortable, SortableConfig, SortableRepository};
pub use crate::core::{Column, DataType, OrmError, Result, Row, Schema, Value};
pub use entity::{EntityManager, LifecycleEvent, Record};
pub use persistence::{Persistence, transactional};
pub use schema::{BehaviorConfig, EntitySchema, parse_schemas};
pub use storage::InMemoryStorage;
