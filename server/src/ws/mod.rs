pub mod actor;
pub mod dispatch;
pub mod events;
pub mod handler;

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push frames to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Process-unique identity of one registered connection. Unregistration is
/// keyed on this, so an old connection closing can never evict a newer
/// registration for the same user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionId(u64);

#[derive(Clone)]
struct Entry {
    id: ConnectionId,
    tx: ConnectionSender,
}

/// In-memory registry of online users. One entry per user id; a second
/// registration for the same user overwrites the first (last wins — no
/// multi-device fan-out). Purely process-scoped: restarts start empty and
/// every user appears offline until they reconnect.
///
/// An explicit instance injected through AppState, so tests get a fresh
/// registry per server.
#[derive(Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    conns: DashMap<String, Entry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for a user. Returns the identity to
    /// hand back to `unregister` when the connection closes.
    pub fn register(&self, user_id: &str, tx: ConnectionSender) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.conns.insert(user_id.to_string(), Entry { id, tx });
        tracing::debug!(user_id = %user_id, "connection registered");
        id
    }

    /// Remove the user's entry only while it still belongs to this
    /// connection. A no-op when the entry is absent or a newer connection
    /// has replaced it, so duplicate close events and connect/disconnect
    /// races are harmless.
    pub fn unregister(&self, user_id: &str, id: ConnectionId) {
        let removed = self.conns.remove_if(user_id, |_, entry| entry.id == id);
        if removed.is_some() {
            tracing::debug!(user_id = %user_id, "connection unregistered");
        }
    }

    /// Sender for a user's current connection, if online.
    pub fn find(&self, user_id: &str) -> Option<ConnectionSender> {
        self.conns.get(user_id).map(|entry| entry.tx.clone())
    }

    /// Number of users currently online.
    pub fn online_count(&self) -> usize {
        self.conns.len()
    }
}
