//! The sortable behavior: a dense `1..N` position column per entity type.

pub mod config;
pub mod engine;
pub mod repository;

pub use config::{NewPosition, SortableConfig};
pub use engine::Sortable;
pub use repository::SortableRepository;
