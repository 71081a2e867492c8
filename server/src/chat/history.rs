use crate::ws::Connection;

use super::store::load_recent;
use super::ChatRoom;

/// Replay the most recent stored lines to `conn` only, oldest first.
///
/// A store failure is logged and replays nothing. Returns the number of lines
/// queued on the connection.
pub async fn send_history(room: &ChatRoom, conn: &Connection) -> usize {
    let limit = room.settings().history_limit;
    if limit == 0 {
        return 0;
    }

    let messages = match load_recent(room.store(), limit).await {
        Ok(messages) => messages,
        Err(e) => {
            tracing::warn!(
                connection_id = %conn.id(),
                error = %e,
                "Failed to load chat history"
            );
            return 0;
        }
    };

    let mut sent = 0;
    for message in &messages {
        if conn.send_text(&message.display_line()).is_err() {
            tracing::debug!(connection_id = %conn.id(), "Connection closed during history replay");
            break;
        }
        sent += 1;
    }

    tracing::debug!(
        connection_id = %conn.id(),
        lines = sent,
        "History replayed"
    );
    sent
}
