//! Error type returned by the gateway handlers

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::{error::ServiceError, rpc::RpcError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Anything a backend service or repository can report
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Login attempts for this account are throttled
    #[error("Too many attempts, retry in {0} seconds")]
    TooManyAttempts(u64),
}

impl From<common::error::DatabaseError> for ApiError {
    fn from(err: common::error::DatabaseError) -> Self {
        ApiError::Service(err.into())
    }
}

impl From<RpcError> for ApiError {
    fn from(err: RpcError) -> Self {
        ApiError::Service(err.into())
    }
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::Service(ServiceError::BadRequest(msg.into()))
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Service(ServiceError::Unauthorized(msg.into()))
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Service(ServiceError::Forbidden(msg.into()))
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::Service(ServiceError::NotFound(msg.into()))
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        ApiError::Service(ServiceError::internal(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Service(err) => err.into_response(),
            ApiError::TooManyAttempts(retry_after) => (
                StatusCode::TOO_MANY_REQUESTS,
                [("retry-after", retry_after.to_string())],
                Json(json!({
                    "error": "too_many_attempts",
                    "message": format!("Too many attempts, retry in {} seconds", retry_after),
                })),
            )
                .into_response(),
        }
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
