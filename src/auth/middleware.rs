//! Axum extractors for session authentication.

use super::gateway::{AuthError, AuthGateway};
use super::session::SESSION_COOKIE;
use crate::config::Config;
use crate::error::AppError;
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;
use std::convert::Infallible;
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<AuthGateway>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn from_config(config: Config) -> Self {
        AppState {
            gateway: Arc::new(AuthGateway::from_config(&config)),
            config: Arc::new(config),
        }
    }
}

/// Session token from the `authorization` cookie, if any.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Authenticated session extractor.
///
/// Enforced policy: 401 when no session cookie is presented, 403 when one is
/// presented but does not validate. Either way the handler never runs.
///
/// `Option<AuthSession>` is the best-effort variant: any failure is `None`.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub address: String,
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match resolve_session(parts, state) {
            Ok(session) => Ok(session),
            Err(AuthError::Unauthenticated) => {
                Err(AppError::Unauthorized("Missing session".to_string()))
            }
            Err(AuthError::InvalidSession(_)) => {
                Err(AppError::Forbidden("Invalid or expired session".to_string()))
            }
        }
    }
}

impl OptionalFromRequestParts<AppState> for AuthSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(resolve_session(parts, state).ok())
    }
}

/// Session behind the request cookie. Rejected tokens are logged with their kind.
fn resolve_session(parts: &Parts, state: &AppState) -> Result<AuthSession, AuthError> {
    let token = session_token(&parts.headers);

    state
        .gateway
        .authenticate_request(token.as_deref())
        .map(|address| AuthSession { address })
        .inspect_err(|err| {
            if let AuthError::InvalidSession(kind) = err {
                tracing::debug!(action = "session_rejected", transport = "http", kind = %kind, "Rejected session cookie");
            }
        })
}
