//! Error types for the store module.

use causeway_core::CoreError;
use causeway_identity::IdentityError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored data failed to decode.
    #[error("corrupt stored data: {0}")]
    Corrupt(#[from] CoreError),

    /// Referenced record not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller supplied data that violates an index invariant.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A blocking task or lock failed.
    #[error("store task failed: {0}")]
    Task(String),
}

impl From<StoreError> for IdentityError {
    fn from(e: StoreError) -> Self {
        IdentityError::Source(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
