//! Unified error handling for the server.

use crate::sync::SyncError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            AppError::Sync(SyncError::InProgress) => {
                (StatusCode::CONFLICT, "Sync already in progress".to_string(), None)
            }
            AppError::Sync(e @ (SyncError::Layout(_) | SyncError::TabNotFound(_))) => {
                tracing::warn!("Sheet layout error: {}", e);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "Sheet layout error".to_string(),
                    Some(e.to_string()),
                )
            }
            AppError::Sync(e @ SyncError::StoreUnavailable { .. }) => {
                tracing::error!("Store unavailable: {:?}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "Store unavailable".to_string(),
                    Some(e.to_string()),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
