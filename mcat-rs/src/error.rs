//! Error types for mcat-rs HTTP handlers

use crate::sync::SyncError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Authentication failed (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Conflict (409), e.g. a sync run already in flight
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Sync run failed
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// mcat-common error
    #[error("Common error: {0}")]
    Common(#[from] mcat_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Sync(SyncError::SourceUnavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SOURCE_UNAVAILABLE")
            }
            ApiError::Sync(SyncError::SuspectedOutage) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SUSPECTED_OUTAGE")
            }
            ApiError::Sync(SyncError::DataIntegrityViolation(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "DATA_INTEGRITY_VIOLATION")
            }
            ApiError::Sync(SyncError::Storage(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR")
            }
            ApiError::Common(_) => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR"),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
