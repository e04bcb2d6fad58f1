//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Create called with an already-known idempotency hash.
    /// The caller should treat this as already-submitted, not retry blindly.
    #[error("Duplicate transaction: hash {0} already exists")]
    DuplicateTransaction(String),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    /// Process/verify called on a transaction not in the expected state.
    /// Under at-least-once job delivery this is the harmless redelivery path.
    #[error("Invalid state: transaction {id} is {status}, expected pending")]
    InvalidState { id: Uuid, status: String },

    #[error("Transaction not found: {0}")]
    NotFound(Uuid),

    /// Isolation-level abort during concurrent processing. Transient;
    /// safe to retry with backoff.
    #[error("Storage conflict: concurrent processing detected, retry with backoff")]
    StorageConflict,

    // Domain validation errors
    #[error(transparent)]
    Amount(#[from] crate::domain::AmountError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AppError {
    /// Whether a queue/caller may safely redeliver after this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StorageConflict)
    }
}

impl From<crate::store::StoreError> for AppError {
    fn from(err: crate::store::StoreError) -> Self {
        use crate::store::StoreError;
        match err {
            StoreError::DuplicateHash(hash) => AppError::DuplicateTransaction(hash),
            StoreError::NotFound(id) => AppError::NotFound(id),
            StoreError::SerializationConflict => AppError::StorageConflict,
            StoreError::InvalidRow(msg) => AppError::Internal(msg),
            StoreError::Database(e) => AppError::Database(e),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::InsufficientBalance { .. } => (
                StatusCode::BAD_REQUEST,
                "insufficient_balance",
                Some(self.to_string()),
            ),
            AppError::Amount(e) => {
                (StatusCode::BAD_REQUEST, "invalid_amount", Some(e.to_string()))
            }

            // 404 Not Found
            AppError::NotFound(id) => {
                (StatusCode::NOT_FOUND, "transaction_not_found", Some(id.to_string()))
            }

            // 409 Conflict
            AppError::DuplicateTransaction(hash) => {
                (StatusCode::CONFLICT, "duplicate_transaction", Some(hash.clone()))
            }
            AppError::InvalidState { .. } => {
                (StatusCode::CONFLICT, "invalid_state", Some(self.to_string()))
            }

            // 503 Service Unavailable (transient, retryable)
            AppError::StorageConflict => {
                (StatusCode::SERVICE_UNAVAILABLE, "storage_conflict", None)
            }

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_conflict_is_retryable() {
        assert!(AppError::StorageConflict.is_retryable());
        assert!(!AppError::NotFound(Uuid::nil()).is_retryable());
        assert!(!AppError::DuplicateTransaction("0xabc".to_string()).is_retryable());
    }

    #[test]
    fn test_invalid_state_message() {
        let err = AppError::InvalidState {
            id: Uuid::nil(),
            status: "completed".to_string(),
        };
        assert!(err.to_string().contains("completed"));
        assert!(err.to_string().contains("expected pending"));
    }
}
