//! API route handlers.

pub mod auth;
pub mod socket;

use crate::auth::{AppState, AuthSession};
use crate::error::AppError;
use crate::middleware::security_headers;
use axum::{
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

/// Build the API router with all endpoints.
pub fn api_router() -> Router<AppState> {
    Router::new()
        // Login flow
        .route("/login-secret", get(auth::login_secret))
        .route("/verify-login", post(auth::verify_login))
        .route("/auth-info", get(auth::auth_info))
        .route("/logout", get(auth::logout))
        // Protected example
        .route("/", get(hello))
        // Connection upgrade
        .route("/ws", get(socket::upgrade))
}

/// Full application: routes plus CORS, panic isolation and security headers.
pub fn app(state: AppState) -> Router {
    // Explicit CORS: deny all cross-origin requests (single-origin deployment).
    let cors = CorsLayer::new();

    api_router()
        .layer(cors)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum::middleware::from_fn(security_headers))
        .with_state(state)
}

/// GET /: Example route behind the enforced session check
async fn hello(_session: AuthSession) -> &'static str {
    "Hello from the REST API!"
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    AppError::Internal(format!("Handler panicked: {}", detail)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_panic_response_is_generic() {
        let response = panic_response(Box::new("boom at secret offset"));
        assert_eq!(response.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Internal server error");
    }
}
