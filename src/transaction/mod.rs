// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Undo-log transactions with nested savepoints.
//
// - Command Pattern: every write records a reversible Change
// - Savepoints: nested begin() marks the log; rollback() reverts to the mark
// - Only the outermost commit() discards the log
//
// ============================================================================

pub mod change;
pub mod manager;
pub mod state;

pub use change::Change;
pub use manager::TransactionManager;
pub use state::{TransactionId, TransactionState};
