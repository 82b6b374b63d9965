//! Application Error Types
//!
//! Centralized error taxonomy with Axum integration.
//!
//! Errors fall into two groups that callers treat differently:
//! - "nothing exists / bad request" (`NotFound`, `InvalidArgument`,
//!   `Unauthorized`, `UnsupportedMessageType`, `Serialization`): do not retry
//! - "could not complete the operation" (`Storage`, `Cache`, `Internal`): retry

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unsupported message type: {0}")]
    UnsupportedMessageType(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the caller may retry the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Storage(_) | AppError::Cache(_) | AppError::Internal(_)
        )
    }

    /// Stable numeric code sent to clients.
    pub fn code(&self) -> u16 {
        match self {
            AppError::Internal(_) => 10000,
            AppError::NotFound(_) => 10001,
            AppError::InvalidArgument(_) => 10002,
            AppError::Unauthorized(_) => 10003,
            AppError::UnsupportedMessageType(_) => 10004,
            AppError::Serialization(_) => 10005,
            AppError::Storage(_) => 10006,
            AppError::Cache(_) => 10007,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::Cache(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serialization(e.to_string())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
    pub retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::UnsupportedMessageType(kind) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Unsupported message type: {}", kind),
            ),
            AppError::Serialization(msg) => {
                tracing::warn!("Serialization error: {}", msg);
                (StatusCode::BAD_REQUEST, "Malformed payload".into())
            }
            AppError::Storage(e) => {
                tracing::error!("Storage error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Storage unavailable".into())
            }
            AppError::Cache(e) => {
                tracing::error!("Cache error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Cache unavailable".into())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };

        let body = ErrorResponse {
            code: self.code(),
            message,
            retryable: self.is_retryable(),
        };

        (status, Json(body)).into_response()
    }
}
