// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use porchlight_core::{EntryLogError, StoreError};
use serde::Serialize;
use thiserror::Error;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized - Invalid API key")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Malformed JSON body: {0}")]
    MalformedBody(String),

    #[error("Live state error: {0}")]
    LiveState(#[from] StoreError),

    #[error("Entry log error: {0}")]
    EntryLog(#[from] EntryLogError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::Unauthorized => {
                tracing::warn!("Rejected request with missing or invalid API key");
                (
                    StatusCode::UNAUTHORIZED,
                    ErrorResponse::new("Unauthorized - Invalid API key"),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (StatusCode::BAD_REQUEST, ErrorResponse::new(msg.clone()))
            }
            ApiError::MalformedBody(msg) => {
                tracing::warn!(message = %msg, "Malformed JSON body");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Invalid JSON body", msg.clone()),
                )
            }
            ApiError::LiveState(store_err) => {
                tracing::error!(error = %store_err, "Failed to persist live state");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Failed to persist live state"),
                )
            }
            ApiError::EntryLog(EntryLogError::Empty) => {
                tracing::info!("Undo requested on an empty log");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new(EntryLogError::Empty.to_string()),
                )
            }
            ApiError::EntryLog(log_err) => {
                tracing::error!(error = %log_err, "Entry log error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Failed to update entry log"),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Run blocking file work off the async runtime.
pub async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
}
