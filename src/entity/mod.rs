//! Entity records, lifecycle events and the manager that persists them.

pub mod events;
pub mod manager;
pub mod record;

pub use events::LifecycleEvent;
pub use manager::EntityManager;
pub use record::{FieldChange, Record};
