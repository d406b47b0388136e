use std::fmt;

/// Points in an entity's persistence lifecycle at which behaviors run.
///
/// Every hook runs inside the same transaction as the write it precedes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Before a new entity is inserted.
    PrePersist,
    /// Before a changed entity is written back.
    PreUpdate,
    /// Before an entity's row is deleted.
    PreRemove,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleEvent::PrePersist => "prePersist",
            LifecycleEvent::PreUpdate => "preUpdate",
            LifecycleEvent::PreRemove => "preRemove",
        };
        write!(f, "{}", name)
    }
}
