//! Authenticated connection upgrades.
//!
//! The session cookie is checked before the `101 Switching Protocols`
//! response goes out; after that there is no protocol-level way to refuse
//! the client. The resolved identity is fixed for the life of the socket.

use crate::auth::{middleware::session_token, AppState};
use crate::config::UpgradePolicy;
use crate::error::AppError;
use crate::models::ConnectionInfo;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use std::time::Duration;

/// Per-connection context established at upgrade time.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub id: String,
    pub address: Option<String>,
}

/// GET /ws: Resolve the caller's identity, then upgrade
pub async fn upgrade(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let gateway = state.gateway.clone();
    let token = session_token(&headers);
    let address = resolve_identity(
        move || gateway.authenticate_upgrade(token.as_deref()),
        state.config.upgrade_auth_timeout(),
    )
    .await;

    match admit(address, state.config.upgrade_policy) {
        Ok(context) => ws.on_upgrade(move |socket| handle_socket(socket, context)),
        Err(err) => err.into_response(),
    }
}

/// Run the session check, bounded by `timeout`. Timeouts count as anonymous.
async fn resolve_identity<F>(check: F, timeout: Duration) -> Option<String>
where
    F: FnOnce() -> Option<String> + Send + 'static,
{
    let check = tokio::task::spawn_blocking(check);

    match tokio::time::timeout(timeout, check).await {
        Ok(Ok(address)) => address,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Upgrade session check failed");
            None
        }
        Err(_) => {
            tracing::warn!(
                action = "ws_auth_timeout",
                timeout_ms = timeout.as_millis() as u64,
                "Upgrade session check timed out"
            );
            None
        }
    }
}

/// Apply the upgrade policy to the resolved identity.
fn admit(address: Option<String>, policy: UpgradePolicy) -> Result<ConnectionContext, AppError> {
    if address.is_none() && policy == UpgradePolicy::RequireIdentity {
        return Err(AppError::Unauthorized("Session required".to_string()));
    }

    Ok(ConnectionContext {
        id: nanoid::nanoid!(12),
        address,
    })
}

async fn handle_socket(mut socket: WebSocket, context: ConnectionContext) {
    tracing::info!(
        action = "ws_connected",
        connection_id = %context.id,
        authenticated = context.address.is_some(),
        "Client connected"
    );

    let info = ConnectionInfo {
        connection_id: context.id.clone(),
        address: context.address.clone(),
    };
    let greeting = match serde_json::to_string(&info) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode connection info");
            return;
        }
    };
    if socket.send(Message::Text(greeting.into())).await.is_err() {
        return;
    }

    while let Some(message) = socket.recv().await {
        match message {
            Ok(Message::Text(text)) => {
                let reply = format!("Server received: {}", text.as_str());
                if socket.send(Message::Text(reply.into())).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(connection_id = %context.id, error = %e, "Socket error");
                break;
            }
        }
    }

    tracing::info!(action = "ws_closed", connection_id = %context.id, "Client disconnected");
}
