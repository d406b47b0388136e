// ============================================================================
// Transaction Manager
// ============================================================================

use super::{Change, TransactionId, TransactionState};
use crate::core::{OrmError, Result};

/// Per-connection undo log.
///
/// `begin()` may be nested; each level is a savepoint into the log.
/// Writes made while no transaction is open are not recorded
/// (auto-commit).
#[derive(Debug, Default)]
pub struct TransactionManager {
    current: Option<TransactionId>,
    log: Vec<Change>,
    savepoints: Vec<usize>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a transaction, or a savepoint when one is already open.
    /// Returns the nesting depth after the call.
    pub fn begin(&mut self) -> usize {
        if self.savepoints.is_empty() {
            self.current = Some(TransactionId::new());
        }
        self.savepoints.push(self.log.len());
        self.savepoints.len()
    }

    /// Records a write. No-op in auto-commit mode.
    pub fn record(&mut self, change: Change) {
        if self.is_active() {
            self.log.push(change);
        }
    }

    /// Releases the innermost level. The log is discarded once the
    /// outermost level commits.
    pub fn commit(&mut self) -> Result<TransactionState> {
        if self.savepoints.pop().is_none() {
            return Err(OrmError::Transaction(
                "Cannot commit: no transaction is active".into(),
            ));
        }
        if self.savepoints.is_empty() {
            self.log.clear();
            self.current = None;
            return Ok(TransactionState::Committed);
        }
        Ok(TransactionState::Active)
    }

    /// Pops the innermost level and returns the changes made since it was
    /// opened, newest first, for the caller to revert. The state is
    /// `Aborted` once the outermost level is gone.
    pub fn rollback(&mut self) -> Result<(TransactionState, Vec<Change>)> {
        let mark = self.savepoints.pop().ok_or_else(|| {
            OrmError::Transaction("Cannot roll back: no transaction is active".into())
        })?;
        let mut undo = self.log.split_off(mark);
        undo.reverse();
        if self.savepoints.is_empty() {
            self.current = None;
            return Ok((TransactionState::Aborted, undo));
        }
        Ok((TransactionState::Active, undo))
    }

    pub fn is_active(&self) -> bool {
        !self.savepoints.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.savepoints.len()
    }

    pub fn current_id(&self) -> Option<TransactionId> {
        self.current
    }

    pub fn pending_changes(&self) -> usize {
        self.log.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(id: i64) -> Change {
        Change::InsertRow {
            table: "t".into(),
            id,
        }
    }

    #[test]
    fn test_auto_commit_records_nothing() {
        let mut tm = TransactionManager::new();
        tm.record(insert(1));
        assert_eq!(tm.pending_changes(), 0);
        assert!(tm.current_id().is_none());
    }

    #[test]
    fn test_rollback_returns_changes_newest_first() {
        let mut tm = TransactionManager::new();
        tm.begin();
        tm.record(insert(1));
        tm.record(insert(2));
        let (state, undo) = tm.rollback().unwrap();
        assert_eq!(state, TransactionState::Aborted);
        assert_eq!(undo, vec![insert(2), insert(1)]);
        assert!(!tm.is_active());
    }

    #[test]
    fn test_nested_rollback_only_reverts_inner_level() {
        let mut tm = TransactionManager::new();
        tm.begin();
        tm.record(insert(1));
        assert_eq!(tm.begin(), 2);
        tm.record(insert(2));
        assert_eq!(
            tm.rollback().unwrap(),
            (TransactionState::Active, vec![insert(2)])
        );
        assert!(tm.is_active());
        assert_eq!(tm.commit().unwrap(), TransactionState::Committed);
        assert_eq!(tm.pending_changes(), 0);
    }

    #[test]
    fn test_inner_commit_keeps_log_for_outer_rollback() {
        let mut tm = TransactionManager::new();
        tm.begin();
        tm.begin();
        tm.record(insert(1));
        assert_eq!(tm.commit().unwrap(), TransactionState::Active);
        assert_eq!(
            tm.rollback().unwrap(),
            (TransactionState::Aborted, vec![insert(1)])
        );
    }

    #[test]
    fn test_commit_without_begin_fails() {
        let mut tm = TransactionManager::new();
        assert!(matches!(tm.commit(), Err(OrmError::Transaction(_))));
        assert!(matches!(tm.rollback(), Err(OrmError::Transaction(_))));
    }
}
