//! Structured storage error, mirroring the teacher's
//! `repository::RepositoryError` / `DatabaseError` split: a stable `kind`
//! plus enough context for a caller to decide whether to retry.

use std::fmt;

use thiserror::Error;

/// The repository operation that failed, used for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryOperation {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepositoryOperation::Create => "create",
            RepositoryOperation::Read => "read",
            RepositoryOperation::Update => "update",
            RepositoryOperation::Delete => "delete",
            RepositoryOperation::List => "list",
        };
        f.write_str(s)
    }
}

/// A repository-layer failure.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// No row matched the given entity type / identifier.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The underlying connection or pool could not be used.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A uniqueness or foreign-key constraint was violated.
    #[error("constraint violation during {operation}: {message}")]
    ConstraintViolation {
        operation: RepositoryOperation,
        message: String,
    },

    /// Any other backend failure not worth a dedicated variant.
    #[error("{operation} failed: {message}")]
    Backend {
        operation: RepositoryOperation,
        message: String,
    },
}

impl RepositoryError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        RepositoryError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn connection_failed(message: impl Into<String>) -> Self {
        RepositoryError::ConnectionFailed(message.into())
    }

    pub fn backend(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        RepositoryError::Backend {
            operation,
            message: message.into(),
        }
    }

    /// Whether the failed operation could plausibly succeed if retried
    /// unmodified: connection-level failures only, never a logical
    /// not-found or constraint violation.
    pub fn is_retriable(&self) -> bool {
        matches!(self, RepositoryError::ConnectionFailed(_))
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => {
                RepositoryError::NotFound {
                    entity: "row".to_string(),
                    id: "<unknown>".to_string(),
                }
            }
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                RepositoryError::ConnectionFailed(e.to_string())
            }
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                RepositoryError::ConstraintViolation {
                    operation: RepositoryOperation::Create,
                    message: e.to_string(),
                }
            }
            other => RepositoryError::Backend {
                operation: RepositoryOperation::Read,
                message: other.to_string(),
            },
        }
    }
}
