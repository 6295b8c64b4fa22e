use std::sync::Arc;

use crate::db::DbPool;
use crate::ws::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Online-user connection registry. Process-lifetime scoped; injected
    /// here rather than living as module-level state so tests get a fresh
    /// registry per server.
    pub connections: Arc<ConnectionRegistry>,
    /// Access token lifetime in days
    pub token_ttl_days: i64,
}
