// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Each Change carries what is needed to undo one write.
//
// ============================================================================

use crate::core::Row;

/// A single reversible write recorded inside a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// A row was inserted; undo removes it.
    InsertRow { table: String, id: i64 },

    /// A row was overwritten; undo restores `old_row`.
    UpdateRow { table: String, id: i64, old_row: Row },

    /// A row was removed; undo puts `old_row` back under the same id.
    DeleteRow { table: String, id: i64, old_row: Row },

    /// A table was created; undo drops it.
    CreateTable { name: String },
}

impl Change {
    /// Get the table name affected by this change
    pub fn table_name(&self) -> &str {
        match self {
            Change::InsertRow { table, .. } => table,
            Change::UpdateRow { table, .. } => table,
            Change::DeleteRow { table, .. } => table,
            Change::CreateTable { name } => name,
        }
    }

    pub fn is_ddl(&self) -> bool {
        matches!(self, Change::CreateTable { .. })
    }
}
