use std::sync::Arc;

use crate::chat::store::SqliteChatStore;
use crate::chat::ChatRoom;
use crate::clock::ReferenceClock;
use crate::config::{AuthConfig, Config, ConfigError};
use crate::db::DbPool;
use crate::ws::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Chat room: connection registry, message store, settings
    pub chat: Arc<ChatRoom>,
    /// Login answers and token lifetime
    pub auth: AuthConfig,
    /// Reference-offset clock for status dates
    pub clock: ReferenceClock,
}

impl AppState {
    /// Wire the chat room and clock from config around an opened database.
    pub fn from_config(
        config: &Config,
        db: DbPool,
        jwt_secret: Vec<u8>,
    ) -> Result<Self, ConfigError> {
        let store = Arc::new(SqliteChatStore::new(db.clone()));
        let chat = ChatRoom::from_config(&config.chat, ConnectionRegistry::new(), store)?;
        let clock = *chat.clock();

        Ok(Self {
            db,
            jwt_secret,
            chat: Arc::new(chat),
            auth: config.auth.clone(),
            clock,
        })
    }
}
