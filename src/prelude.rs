//! Everything needed to declare entities and order them.
//!
//! ```
//! use rustsortable::prelude::*;
//! ```

pub use crate::behavior::{Behavior, NewPosition, SortableConfig, SortableRepository};
pub use crate::core::{Column, DataType, OrmError, Result, Value};
pub use crate::entity::{EntityManager, LifecycleEvent, Record};
pub use crate::persistence::{Persistence, transactional};
pub use crate::schema::{BehaviorConfig, EntitySchema};
pub use crate::storage::InMemoryStorage;
