//! Error types for the record store.

use devprov_core::FactoryId;
use thiserror::Error;

use crate::query::QueryError;

/// Result type alias for record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    /// A foreign-key, unique or check constraint rejected the write.
    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A conditional write matched zero rows.
    #[error("device {id} is no longer in the expected state ({expected})")]
    Precondition { id: FactoryId, expected: String },

    #[error(transparent)]
    Query(#[from] QueryError),
}
