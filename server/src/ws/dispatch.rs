//! Best-effort notification dispatch to online users.
//!
//! Delivery is fire-and-forget, at most once: offline recipients are
//! skipped, nothing is queued for reconnect, and per-recipient failures
//! never reach the HTTP handler that triggered the event — the domain
//! mutation has already committed.

use axum::extract::ws::Message;

use super::events::{EventCode, EventData, OutboundFrame};
use super::ConnectionRegistry;

/// Push one event to one user. Silent no-op when the user is offline. A
/// failed queue send is ignored the same way; the connection actor owns
/// the cleanup path for dead sockets.
pub fn notify(registry: &ConnectionRegistry, user_id: &str, code: EventCode, data: EventData) {
    let Some(tx) = registry.find(user_id) else {
        tracing::trace!(user_id = %user_id, ?code, "recipient offline, dropping notification");
        return;
    };

    let frame = OutboundFrame {
        message: data,
        code,
    };
    let text = match serde_json::to_string(&frame) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize outbound frame");
            return;
        }
    };

    let _ = tx.send(Message::Text(text.into()));
}

/// Conversation participants minus the acting user.
pub fn audience(participants: &[String], actor_id: &str) -> Vec<String> {
    participants
        .iter()
        .filter(|p| p.as_str() != actor_id)
        .cloned()
        .collect()
}

/// Fan an event out to every participant except the actor, one dispatch
/// per recipient. Per-destination ordering follows call order; no ordering
/// is implied across recipients.
pub fn notify_audience(
    registry: &ConnectionRegistry,
    participants: &[String],
    actor_id: &str,
    code: EventCode,
    data: &EventData,
) {
    for user_id in audience(participants, actor_id) {
        notify(registry, &user_id, code, data.clone());
    }
}
