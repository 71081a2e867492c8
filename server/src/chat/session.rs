//! Per-connection chat session: Connecting → Active → Closed.

use std::sync::Arc;

use crate::ws::Connection;

use super::history::send_history;
use super::store::persist;
use super::{departure_notice, join_notice, ChatMessage, ChatRoom};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closed,
}

/// Drives one connection's lifecycle against the shared room.
///
/// Frames are handled one at a time by the owning task, so a connection's
/// messages are stored and broadcast in arrival order.
pub struct ChatSession {
    room: Arc<ChatRoom>,
    connection: Connection,
    state: SessionState,
}

impl ChatSession {
    pub fn new(room: Arc<ChatRoom>, connection: Connection) -> Self {
        Self {
            room,
            connection,
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Register the connection, replay history to it, and enter Active.
    /// No chat line is stored or broadcast in between, so history and live
    /// traffic never overlap. Returns the number of history lines replayed.
    pub async fn open(&mut self) -> usize {
        if self.state != SessionState::Connecting {
            return 0;
        }

        let replayed = {
            let _sequence = self.room.sequence().await;
            self.room.registry().connect(self.connection.clone());
            send_history(&self.room, &self.connection).await
        };
        self.state = SessionState::Active;

        if self.room.settings().announce_joins {
            self.room
                .registry()
                .broadcast(&join_notice(self.connection.name()));
        }

        tracing::info!(
            connection_id = %self.connection.id(),
            user = %self.connection.name(),
            history = replayed,
            "Chat session opened"
        );
        replayed
    }

    /// Handle one inbound text frame: persist it, then broadcast it.
    ///
    /// Returns the number of recipients, or `None` when the session is not
    /// Active.
    pub async fn receive(&mut self, text: &str) -> Option<usize> {
        if self.state != SessionState::Active {
            tracing::debug!(
                connection_id = %self.connection.id(),
                state = ?self.state,
                "Dropping frame outside Active state"
            );
            return None;
        }

        let _sequence = self.room.sequence().await;
        let message = ChatMessage::new(
            self.connection.name(),
            text,
            self.room.clock().timestamp(),
        );
        let line = message.display_line();

        if let Err(e) = persist(self.room.store(), message).await {
            tracing::warn!(
                connection_id = %self.connection.id(),
                user = %self.connection.name(),
                error = %e,
                "Failed to store chat message"
            );
            if !self.room.settings().broadcast_on_store_failure {
                return Some(0);
            }
        }

        Some(self.room.registry().broadcast(&line))
    }

    /// Deregister and announce the departure. Later calls are no-ops.
    pub fn close(&mut self) {
        match self.state {
            SessionState::Closed => return,
            SessionState::Connecting => {
                self.state = SessionState::Closed;
                return;
            }
            SessionState::Active => {}
        }

        self.state = SessionState::Closed;
        self.room.registry().disconnect(self.connection.id());
        self.room
            .registry()
            .broadcast(&departure_notice(self.connection.name()));

        tracing::info!(
            connection_id = %self.connection.id(),
            user = %self.connection.name(),
            "Chat session closed"
        );
    }
}
