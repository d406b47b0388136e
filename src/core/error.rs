use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrmError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Entity '{entity}' with id {id} not found")]
    EntityNotFound { entity: String, id: i64 },

    #[error("Entity '{0}' is not registered")]
    UnknownEntity(String),

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl OrmError {
    /// Storage-level failures may succeed once the cause is resolved.
    /// Programmer errors (bad configuration, wrong arguments, violated
    /// preconditions) never will.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EntityNotFound { .. }
                | Self::ConstraintViolation(_)
                | Self::Transaction(_)
                | Self::LockError(_)
                | Self::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, OrmError>;

impl<T> From<std::sync::PoisonError<T>> for OrmError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<std::io::Error> for OrmError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_programmer_errors_are_not_retryable() {
        assert!(!OrmError::Configuration("x".into()).is_retryable());
        assert!(!OrmError::InvalidArgument("x".into()).is_retryable());
        assert!(!OrmError::PreconditionFailed("x".into()).is_retryable());
    }

    #[test]
    fn test_storage_errors_are_retryable() {
        let err = OrmError::EntityNotFound {
            entity: "Sortable".into(),
            id: 3,
        };
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Entity 'Sortable' with id 3 not found");
    }
}
