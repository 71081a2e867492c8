//! Broadcast chat room: message model, persistence seam, history replay and
//! the per-connection session state machine.

pub mod history;
pub mod session;
pub mod store;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

use crate::clock::ReferenceClock;
use crate::config::{ChatConfig, ConfigError};
use crate::ws::ConnectionRegistry;
use store::ChatStore;

/// Persisted chat record. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub user_name: String,
    pub message: String,
    pub timestamp: String,
}

impl ChatMessage {
    pub fn new(
        user_name: impl Into<String>,
        message: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            user_name: user_name.into(),
            message: message.into(),
            timestamp: timestamp.into(),
        }
    }

    /// `#<user_name>: <message> (<timestamp>)`, used for both replayed and
    /// live lines.
    pub fn display_line(&self) -> String {
        format!("#{}: {} ({})", self.user_name, self.message, self.timestamp)
    }
}

/// System notice broadcast after a connection closes.
pub fn departure_notice(name: &str) -> String {
    format!("{}님의 연결이 끊겼습니다.", name)
}

/// System notice broadcast after a connection joins (when enabled).
pub fn join_notice(name: &str) -> String {
    format!("반가워요 {}님!", name)
}

/// Room behaviour knobs, resolved from `[chat]`.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub history_limit: u32,
    pub announce_joins: bool,
    pub broadcast_on_store_failure: bool,
    pub ping_interval: Option<Duration>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            history_limit: 100,
            announce_joins: false,
            broadcast_on_store_failure: true,
            ping_interval: Some(Duration::from_secs(30)),
        }
    }
}

impl From<&ChatConfig> for ChatSettings {
    fn from(config: &ChatConfig) -> Self {
        Self {
            history_limit: config.history_limit,
            announce_joins: config.announce_joins,
            broadcast_on_store_failure: config.broadcast_on_store_failure,
            ping_interval: (config.ping_interval_secs > 0)
                .then(|| Duration::from_secs(config.ping_interval_secs)),
        }
    }
}

/// Everything a chat session needs: the shared registry, the message store,
/// the reference clock and the room settings.
pub struct ChatRoom {
    registry: ConnectionRegistry,
    store: Arc<dyn ChatStore>,
    clock: ReferenceClock,
    settings: ChatSettings,
    /// Held across store-then-broadcast and across register-then-replay, so
    /// every chat line reaches a newcomer exactly once: in history or live.
    sequence: Mutex<()>,
}

impl ChatRoom {
    pub fn new(
        registry: ConnectionRegistry,
        store: Arc<dyn ChatStore>,
        clock: ReferenceClock,
        settings: ChatSettings,
    ) -> Self {
        Self {
            registry,
            store,
            clock,
            settings,
            sequence: Mutex::new(()),
        }
    }

    pub fn from_config(
        config: &ChatConfig,
        registry: ConnectionRegistry,
        store: Arc<dyn ChatStore>,
    ) -> Result<Self, ConfigError> {
        let clock = ReferenceClock::new(config.offset()?);
        Ok(Self::new(registry, store, clock, ChatSettings::from(config)))
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn store(&self) -> Arc<dyn ChatStore> {
        self.store.clone()
    }

    pub fn clock(&self) -> &ReferenceClock {
        &self.clock
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub(crate) async fn sequence(&self) -> MutexGuard<'_, ()> {
        self.sequence.lock().await
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_line_shape() {
        let msg = ChatMessage::new("A", "hello", "2024.05.01 09:00:00");
        assert_eq!(msg.display_line(), "#A: hello (2024.05.01 09:00:00)");
    }

    #[test]
    fn notices_are_not_hash_prefixed() {
        assert_eq!(departure_notice("B"), "B님의 연결이 끊겼습니다.");
        assert_eq!(join_notice("B"), "반가워요 B님!");
    }

    #[test]
    fn zero_ping_interval_disables_keepalive() {
        let config = ChatConfig {
            ping_interval_secs: 0,
            ..ChatConfig::default()
        };
        assert!(ChatSettings::from(&config).ping_interval.is_none());
        assert_eq!(
            ChatSettings::from(&ChatConfig::default()).ping_interval,
            Some(Duration::from_secs(30))
        );
    }
}
