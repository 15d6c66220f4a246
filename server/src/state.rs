use std::sync::Arc;

use crate::collab::registry::RoomRegistry;
use crate::db::DbPool;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Access token lifetime in minutes
    pub token_expire_minutes: i64,
    /// Collaboration rooms: connections, presence, broadcast.
    /// Constructor-injected so tests can run isolated instances.
    pub rooms: Arc<RoomRegistry>,
}
