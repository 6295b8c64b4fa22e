use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::db::models::User;
use crate::state::AppState;
use crate::ws::ConnectionSender;

/// Ping interval: server sends WebSocket ping every 30 seconds.
/// Prevents connection leaks from abrupt disconnects.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if pong not received within 10 seconds after ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the actor-per-connection pattern for an authenticated WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader loop: processes incoming frames until the connection closes
///
/// The mpsc sender registered with the connection registry is how the rest
/// of the system pushes notifications to this client.
pub async fn run_connection(socket: WebSocket, state: AppState, user: User) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Register this connection; the returned identity keys the cleanup.
    let conn_id = state.connections.register(&user.id, tx.clone());

    tracing::info!(user_id = %user.id, "WebSocket actor started");

    // Spawn writer task: forwards mpsc messages to WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue
                }
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket messages
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    handle_text_frame(&text, &tx, &user.id);
                }
                Message::Binary(_) => {
                    tracing::debug!(
                        user_id = %user.id,
                        "ignoring binary frame (protocol is JSON text)"
                    );
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    // Respond to client pings with pong
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        user_id = %user.id,
                        reason = ?frame,
                        "client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    user_id = %user.id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(user_id = %user.id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort writer and ping tasks
    writer_handle.abort();
    ping_handle.abort();

    // Runs exactly once per connection, on every close cause. Keyed by
    // connection identity so a newer registration for this user survives.
    state.connections.unregister(&user.id, conn_id);

    tracing::info!(user_id = %user.id, "WebSocket actor stopped");
}

/// Inbound frames are JSON text. Valid payloads get a minimal echo
/// acknowledgement; malformed ones are logged and dropped with the
/// connection left open. The richer protocol (messages, joins, leaves) is
/// driven by the HTTP endpoints calling the dispatcher, not by inbound
/// socket frames.
fn handle_text_frame(text: &str, tx: &ConnectionSender, user_id: &str) {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => {
            let ack = serde_json::json!({ "echo": value });
            let _ = tx.send(Message::Text(ack.to_string().into()));
        }
        Err(e) => {
            tracing::warn!(
                user_id = %user_id,
                error = %e,
                "dropping malformed inbound frame"
            );
        }
    }
}

/// Writer task: receives messages from mpsc channel and forwards them to
/// the WebSocket sink. A send failure ends the task; the reader loop's
/// cleanup path handles the rest.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            break;
        }
    }
}
