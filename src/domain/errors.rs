//! Domain errors for the task-management core.

use thiserror::Error;

/// Domain-level errors that can occur across the task API and its consumers.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("not found")]
    NotFound,

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("forbidden")]
    Forbidden,

    #[error("unauthorized")]
    Unauthorized,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("downstream unavailable: {0}")]
    Unavailable(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DomainError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DomainError::Conflict(db_err.to_string())
            }
            other => DomainError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
