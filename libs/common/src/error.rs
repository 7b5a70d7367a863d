//! Custom error types for the common library
//!
//! This module defines the storage-level errors shared by every service and
//! the transport-level [`ServiceError`] that handlers return.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use sqlx::Error as SqlxError;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Beginning or committing a transaction failed
    #[error("Database transaction error: {0}")]
    Transaction(#[source] SqlxError),

    /// The call did not finish within the configured deadline
    #[error("Database call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A stored value could not be decoded into its domain type
    #[error("Database decode error: {0}")]
    Decode(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

impl DatabaseError {
    /// Whether the underlying error is a unique constraint violation
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DatabaseError::Query(SqlxError::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Errors raised by the key-value store driver
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    Connection(String),

    #[error("Cache command error: {0}")]
    Command(#[from] redis::RedisError),
}

/// Type alias for Result with CacheError
pub type CacheResult<T> = Result<T, CacheError>;

/// Wire representation of an error crossing a service boundary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

/// Transport-level error kinds shared by every service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Uniqueness or state conflict. Rendered as 400 like other client errors.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),

    /// Retryable storage failure
    #[error("transaction failed (correlation id {correlation_id})")]
    TransactionFailed { correlation_id: Uuid },

    #[error("payment init failed: {0}")]
    PaymentInitFailed(String),
}

impl ServiceError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        ServiceError::Internal(err.to_string())
    }

    /// Build a `TransactionFailed` with a fresh correlation id, logging the cause under it
    pub fn transaction_failed(cause: impl std::fmt::Display) -> Self {
        let correlation_id = Uuid::new_v4();
        error!(%correlation_id, "transaction failed: {}", cause);
        ServiceError::TransactionFailed { correlation_id }
    }

    /// Stable kind string used on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::Internal(_) => "internal",
            ServiceError::TransactionFailed { .. } => "transaction_failed",
            ServiceError::PaymentInitFailed(_) => "payment_init_failed",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::BadRequest(_)
            | ServiceError::Conflict(_)
            | ServiceError::PaymentInitFailed(_) => StatusCode::BAD_REQUEST,
            ServiceError::Internal(_) | ServiceError::TransactionFailed { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to hand to a client
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Unauthorized(msg)
            | ServiceError::Forbidden(msg)
            | ServiceError::NotFound(msg)
            | ServiceError::BadRequest(msg)
            | ServiceError::Conflict(msg)
            | ServiceError::PaymentInitFailed(msg) => msg.clone(),
            ServiceError::Internal(_) => "Internal server error".to_string(),
            ServiceError::TransactionFailed { .. } => "Transaction failed, retry".to_string(),
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.kind().to_string(),
            message: self.public_message(),
            correlation_id: match self {
                ServiceError::TransactionFailed { correlation_id } => Some(*correlation_id),
                _ => None,
            },
        }
    }

    /// Rebuild an error received from another service
    pub fn from_body(body: ErrorBody) -> Self {
        let ErrorBody {
            error,
            message,
            correlation_id,
        } = body;
        match error.as_str() {
            "unauthorized" => ServiceError::Unauthorized(message),
            "forbidden" => ServiceError::Forbidden(message),
            "not_found" => ServiceError::NotFound(message),
            "bad_request" => ServiceError::BadRequest(message),
            "conflict" => ServiceError::Conflict(message),
            "transaction_failed" => ServiceError::TransactionFailed {
                correlation_id: correlation_id.unwrap_or_else(Uuid::new_v4),
            },
            "payment_init_failed" => ServiceError::PaymentInitFailed(message),
            _ => ServiceError::Internal(message),
        }
    }
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Decode(_) | DatabaseError::Configuration(_) => {
                error!("database error: {}", err);
                ServiceError::Internal(err.to_string())
            }
            other => ServiceError::transaction_failed(other),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        if let ServiceError::Internal(cause) = &self {
            error!("internal error: {}", cause);
        }
        (self.status_code(), Json(self.to_body())).into_response()
    }
}
