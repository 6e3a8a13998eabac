//! Error types shared by all services.
//!
//! Every handler returns `AppResult<T>`; the `IntoResponse` impl turns an
//! `AppError` into the standard error envelope with a matching status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::ApiResponse;

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Application error.
#[derive(Debug, Error)]
pub enum AppError {
    /// A referenced document does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Request payload failed validation.
    #[error("{0}")]
    Validation(String),

    /// Request is well-formed but cannot be served (unsupported configuration, bad import data).
    #[error("{0}")]
    BadRequest(String),

    /// Write carried a stale or missing revision.
    #[error("Document update conflict: {0}")]
    Conflict(String),

    /// Query runner failed or timed out.
    #[error("{0}")]
    Execution(String),

    /// Usage quota refused the query.
    #[error("{0}")]
    UsageLimit(String),

    /// Object storage upload or URL signing failed.
    #[error("{0}")]
    Storage(String),

    /// Document store failure.
    #[error("Database error: {0}")]
    Database(String),

    /// Variable cache failure.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Call to another service failed.
    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable code placed in the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Execution(_) => "QUERY_EXECUTION_FAILED",
            AppError::UsageLimit(_) => "USAGE_LIMIT_EXCEEDED",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Cache(_) => "CACHE_ERROR",
            AppError::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_)
            | AppError::BadRequest(_)
            | AppError::Execution(_)
            | AppError::UsageLimit(_)
            | AppError::Storage(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "request rejected");
        }
        let body = ApiResponse::err(self.code(), self.to_string());
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Cache(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("invalid document: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_errors_are_client_errors() {
        for err in [
            AppError::NotFound("missing".into()),
            AppError::Validation("bad".into()),
            AppError::Execution("boom".into()),
            AppError::Storage("denied".into()),
            AppError::UsageLimit("limit".into()),
        ] {
            assert!(err.status().is_client_error(), "{:?}", err);
        }
    }

    #[test]
    fn test_execution_message_is_passed_through() {
        let err = AppError::Execution("connection refused".into());
        assert_eq!(err.to_string(), "connection refused");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
