use axum::extract::ws::Message;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque identifier assigned to each chat connection.
pub type ConnectionId = Uuid;

/// Type alias for the sender half of a WebSocket connection's outbound queue.
/// The connection's writer task drains the matching receiver in FIFO order.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// The outbound queue of a connection has been dropped (its writer is gone).
#[derive(Debug, thiserror::Error)]
#[error("connection {0} is closed")]
pub struct DeliveryError(pub ConnectionId);

/// One open chat channel: id, unauthenticated display name and outbound queue.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    name: String,
    sender: ConnectionSender,
}

impl Connection {
    pub fn new(name: impl Into<String>, sender: ConnectionSender) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            sender,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a frame for this connection only.
    pub fn send(&self, msg: Message) -> Result<(), DeliveryError> {
        self.sender.send(msg).map_err(|_| DeliveryError(self.id))
    }

    pub fn send_text(&self, text: &str) -> Result<(), DeliveryError> {
        self.send(Message::Text(text.into()))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Connection registry: the set of currently open chat connections.
///
/// Cloning is cheap and every clone shares the same set. Connections are keyed
/// by id so a connection can be present at most once.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<DashMap<ConnectionId, Connection>>,
    /// Serializes fan-out so every connection sees broadcasts in call order.
    fanout: Arc<Mutex<()>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Re-registering the same id replaces the entry.
    pub fn connect(&self, conn: Connection) {
        let id = conn.id;
        self.connections.insert(id, conn);
        tracing::debug!(
            connection_id = %id,
            connections = self.connections.len(),
            "Connection registered"
        );
    }

    /// Remove a connection. Absent ids are ignored.
    pub fn disconnect(&self, id: ConnectionId) -> Option<Connection> {
        let removed = self.connections.remove(&id).map(|(_, conn)| conn);
        tracing::debug!(
            connection_id = %id,
            removed = removed.is_some(),
            connections = self.connections.len(),
            "Connection unregistered"
        );
        removed
    }

    /// Send `text` to every registered connection.
    ///
    /// The set is snapshotted first so connects and disconnects racing with the
    /// fan-out never observe a half-iterated map. A failed delivery is logged
    /// and skipped. Returns the number of connections that accepted the frame.
    pub fn broadcast(&self, text: &str) -> usize {
        let msg = Message::Text(text.into());
        let _fanout = self.fanout.lock().unwrap_or_else(|e| e.into_inner());

        let targets = self.snapshot();
        let mut delivered = 0;
        for conn in &targets {
            match conn.send(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn.id,
                        user = %conn.name,
                        error = %e,
                        "Broadcast delivery failed"
                    );
                }
            }
        }
        delivered
    }

    /// Clone of the live connections at this instant.
    pub fn snapshot(&self) -> Vec<Connection> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
