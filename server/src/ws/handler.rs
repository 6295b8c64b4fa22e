use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;

use crate::auth::jwt;
use crate::state::AppState;
use crate::ws::actor;

/// Rejection text sent to an unauthenticated connection before closing it.
const REJECTION_TEXT: &str = "User not authenticated";

/// Bound on the identity lookup between transport upgrade and registration.
/// The connection is closed if authentication has not resolved by then.
const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Query parameters for WebSocket connection. Browser clients cannot set
/// headers on an upgrade request, so the token may arrive as ?token=JWT;
/// the Authorization header is accepted as well.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// GET /ws?token=JWT
/// WebSocket upgrade endpoint. The transport handshake is accepted first;
/// authentication runs on the upgraded socket, which is rejected and closed
/// without ever being registered when it fails.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let token = params.token.or_else(|| bearer_token(&headers));
    ws.on_upgrade(move |socket| handle_socket(socket, state, token))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Authenticate the upgraded socket, then hand it to the connection actor.
/// No frames are processed and nothing is registered until the identity
/// lookup completes.
async fn handle_socket(mut socket: WebSocket, state: AppState, token: Option<String>) {
    let user = match token {
        Some(token) => {
            match timeout(
                AUTH_TIMEOUT,
                jwt::resolve_user(&state.db, &state.jwt_secret, &token),
            )
            .await
            {
                Ok(user) => user,
                Err(_) => {
                    tracing::warn!("identity lookup timed out during WebSocket handshake");
                    None
                }
            }
        }
        None => None,
    };

    match user {
        Some(user) => {
            tracing::info!(
                user_id = %user.id,
                email = %user.email,
                "WebSocket connection authenticated"
            );
            actor::run_connection(socket, state, user).await;
        }
        None => {
            tracing::warn!("WebSocket auth failed, rejecting connection");
            let _ = socket.send(Message::Text(REJECTION_TEXT.into())).await;
            let _ = socket.send(Message::Close(None)).await;
        }
    }
}
