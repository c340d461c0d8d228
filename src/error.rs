//! Error types and Axum response conversions.

use crate::auth::LoginError;
use crate::config::ErrorStatusMode;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application error types.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl AppError {
    /// Render under the configured status policy. The body is
    /// `{"error": message}` either way; only the status line differs.
    pub fn into_response_with(self, mode: ErrorStatusMode) -> Response {
        let (status, message) = match &self {
            AppError::Internal(msg) => {
                // Log detailed error server-side, return generic message to client
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
        };

        let status = match mode {
            ErrorStatusMode::StatusCodes => status,
            ErrorStatusMode::AlwaysOk => StatusCode::OK,
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.into_response_with(ErrorStatusMode::StatusCodes)
    }
}

impl From<LoginError> for AppError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::MalformedInput(_) => AppError::BadRequest(err.to_string()),
            LoginError::BadChallenge(_) | LoginError::InvalidSignature(_) => {
                AppError::Unauthorized(err.to_string())
            }
            LoginError::Session(e) => AppError::Internal(format!("Session signing: {}", e)),
        }
    }
}
