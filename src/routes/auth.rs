//! Login, logout and session introspection endpoints.

use crate::auth::{AppState, AuthSession, IssuedSession, SignedChallenge};
use crate::error::AppError;
use crate::models::{AuthInfoResponse, LoginSecretResponse, VerifyLoginRequest, VerifyLoginResponse};
use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;

/// GET /login-secret: Issue a challenge to sign
pub async fn login_secret(State(state): State<AppState>) -> Json<LoginSecretResponse> {
    let secret = state.gateway.begin_login();
    tracing::debug!(action = "login_secret_issued", "Challenge issued");
    Json(LoginSecretResponse { secret })
}

/// POST /verify-login: Verify a signed challenge and set the session cookie
pub async fn verify_login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<VerifyLoginRequest>, JsonRejection>,
) -> Response {
    match complete_login(&state, payload) {
        Ok(session) => {
            tracing::info!(action = "auth_success", address = %session.address, expires_at = session.expires_at, "User authenticated");
            let cookie = state.gateway.session_cookie(&session);
            (
                jar.add(cookie),
                Json(VerifyLoginResponse {
                    token: session.token,
                }),
            )
                .into_response()
        }
        Err(err) => err.into_response_with(state.config.error_status_mode),
    }
}

fn complete_login(
    state: &AppState,
    payload: Result<Json<VerifyLoginRequest>, JsonRejection>,
) -> Result<IssuedSession, AppError> {
    let Json(req) = payload.map_err(|rejection| {
        tracing::debug!(action = "auth_failed", error = %rejection, "Unreadable login body");
        AppError::BadRequest("invalid request body".to_string())
    })?;

    let signed = SignedChallenge::from_parts(req.original_message, req.signed_message)?;

    state.gateway.complete_login(&signed).map_err(|err| {
        // Debug output carries the specific failure kind; the client only sees Display.
        tracing::warn!(action = "auth_failed", reason = ?err, "Login rejected");
        AppError::from(err)
    })
}

/// GET /auth-info: Address behind the session cookie, if any
pub async fn auth_info(session: Option<AuthSession>) -> Json<AuthInfoResponse> {
    Json(AuthInfoResponse {
        address: session.map(|s| s.address),
    })
}

/// GET /logout: Overwrite the session cookie with an expired empty value
pub async fn logout(
    State(state): State<AppState>,
    session: Option<AuthSession>,
    jar: CookieJar,
) -> impl IntoResponse {
    if let Some(session) = &session {
        tracing::info!(action = "logout", address = %session.address, "User logged out");
    }

    (
        jar.add(state.gateway.logout()),
        Json(serde_json::json!({})),
    )
}
