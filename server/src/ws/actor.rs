use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout};

use crate::chat::session::ChatSession;
use crate::chat::ChatRoom;
use crate::ws::Connection;

/// Pong timeout: if pong not received within 10 seconds after ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the actor-per-connection pattern for one chat WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader loop: feeds text frames to the chat session one at a time
///
/// The registry holds a clone of the channel sender, so broadcasts from any
/// session land in this connection's queue.
pub async fn run_connection(socket: WebSocket, room: Arc<ChatRoom>, name: String) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let connection = Connection::new(name, tx.clone());
    let connection_id = connection.id();
    let user = connection.name().to_string();

    // Writer first so history replay drains as soon as it is queued.
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    let mut session = ChatSession::new(room.clone(), connection);
    session.open().await;

    // Track pong reception; the ping task fires `dead_rx` when a pong is late
    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let (dead_tx, mut dead_rx) = oneshot::channel::<()>();
    let ping_handle = room
        .settings()
        .ping_interval
        .map(|every| tokio::spawn(ping_task(tx.clone(), pong_rx, dead_tx, every)));
    let keepalive = ping_handle.is_some();

    // Reader loop: process incoming WebSocket messages
    loop {
        let frame = tokio::select! {
            frame = ws_receiver.next() => frame,
            _ = &mut dead_rx, if keepalive => {
                tracing::warn!(
                    connection_id = %connection_id,
                    user = %user,
                    "Peer unresponsive, dropping connection"
                );
                break;
            }
        };

        match frame {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    session.receive(text.as_str()).await;
                }
                Message::Binary(data) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        bytes = data.len(),
                        "Ignoring binary frame"
                    );
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        connection_id = %connection_id,
                        user = %user,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    user = %user,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(connection_id = %connection_id, user = %user, "WebSocket stream ended");
                break;
            }
        }
    }

    // Deregister before tearing down the writer so no broadcast targets a
    // half-closed queue.
    session.close();

    writer_handle.abort();
    if let Some(handle) = ping_handle {
        handle.abort();
    }
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed, connection is broken
            break;
        }
    }
}

/// Ping task: sends periodic pings and closes the connection when a pong is late.
///
/// Returning, for any reason, drops `dead_tx` and ends the reader loop.
async fn ping_task(
    tx: mpsc::UnboundedSender<Message>,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    dead_tx: oneshot::Sender<()>,
    every: Duration,
) {
    let mut ping_timer = interval(every);
    // Skip the first immediate tick
    ping_timer.tick().await;

    loop {
        ping_timer.tick().await;

        if tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
            // Writer task has died, connection is gone
            break;
        }

        match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
            Ok(Some(())) => {}
            _ => {
                tracing::warn!("Pong timeout, closing connection");
                let _ = tx.send(Message::Close(Some(CloseFrame {
                    code: 1001,
                    reason: "Pong timeout".into(),
                })));
                let _ = dead_tx.send(());
                break;
            }
        }
    }
}
