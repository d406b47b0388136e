pub mod catalog;
pub mod memory;
pub mod snapshot;
pub mod table;

pub use catalog::Catalog;
pub use memory::InMemoryStorage;
pub use table::{ID_COLUMN, Table, TableSchema};
