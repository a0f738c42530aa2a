//! HTTP error mapping for API handlers.

use crate::AppError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Error returned by handlers; renders as `{"error": "..."}` with a mapped status.
#[derive(Debug)]
pub enum HttpError {
    App(AppError),
    Internal(String),
}

impl From<AppError> for HttpError {
    fn from(value: AppError) -> Self {
        Self::App(value)
    }
}

impl HttpError {
    /// Status code and client-facing message for this error.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::App(AppError::NotFound) => (StatusCode::NOT_FOUND, "Not found".to_string()),
            Self::App(AppError::BadRequest(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::App(AppError::Forbidden(msg)) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::App(AppError::Conflict { .. }) => (
                StatusCode::CONFLICT,
                "Paste is busy, try again".to_string(),
            ),
            Self::App(err) if err.is_transient() => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Storage temporarily unavailable".to_string(),
            ),
            Self::App(AppError::Messaging(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Messaging temporarily unavailable".to_string(),
            ),
            Self::App(_) | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            match &self {
                Self::App(err) => tracing::error!("Request failed: {}", err),
                Self::Internal(msg) => tracing::error!("Request failed: {}", msg),
            }
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
