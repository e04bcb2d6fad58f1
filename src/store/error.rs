//! Ledger Store Errors

use uuid::Uuid;

/// Errors that can occur in the ledger store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Unique constraint on the idempotency hash was violated
    #[error("Transaction hash already exists: {0}")]
    DuplicateHash(String),

    /// Serializable isolation abort or deadlock (SQLSTATE 40001 / 40P01).
    /// Expected under contention; safe to retry with backoff.
    #[error("Serialization conflict, transaction aborted")]
    SerializationConflict,

    /// Referenced transaction does not exist
    #[error("Transaction not found: {0}")]
    NotFound(Uuid),

    /// Stored row contains a value the domain types reject
    #[error("Invalid row data: {0}")]
    InvalidRow(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Check if this error is transient and retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::SerializationConflict)
    }

    /// Map a sqlx error, recognizing serialization aborts and deadlocks
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if let Some(code) = db_err.code() {
                if code == "40001" || code == "40P01" {
                    return StoreError::SerializationConflict;
                }
            }
        }
        StoreError::Database(err)
    }
}
