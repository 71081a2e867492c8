//! Integration tests for the broadcast chat room over real WebSockets:
//! history replay, fan-out, departure notices and persistence.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use cohort_server::chat::store::ChatStore;
use cohort_server::config::{ChatConfig, Config};
use cohort_server::state::AppState;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Helper: start the server on a random port with keepalive disabled.
async fn start_test_server() -> (AppState, SocketAddr) {
    start_test_server_with_ping(0).await
}

/// Helper: start the server on a random port and return (state, addr).
/// The returned state shares the live registry and store with the server.
async fn start_test_server_with_ping(ping_interval_secs: u64) -> (AppState, SocketAddr) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let config = Config {
        data_dir: data_dir.clone(),
        chat: ChatConfig {
            utc_offset: "+09:00".to_string(),
            ping_interval_secs,
            ..ChatConfig::default()
        },
        ..Config::default()
    };

    let db = cohort_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = cohort_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");
    let state = AppState::from_config(&config, db, jwt_secret).expect("Failed to build state");

    let app = cohort_server::routes::build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        // Keep tmp_dir alive so the data directory isn't deleted
        let _keep = tmp_dir;
    });

    (state, addr)
}

async fn connect(addr: SocketAddr, name: &str) -> WsStream {
    let url = format!("ws://{}/chat/{}", addr, name);
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("WebSocket connect failed");
    ws
}

/// Wait until the registry holds exactly `n` connections.
async fn wait_for_connections(state: &AppState, n: usize) {
    let registry = state.chat.registry().clone();
    tokio::time::timeout(Duration::from_secs(5), async move {
        while registry.len() != n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("registry never reached {} connections", n));
}

/// Next text frame, skipping control frames.
async fn next_text(ws: &mut WsStream) -> String {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("Timed out waiting for a text frame")
            .expect("Stream ended")
            .expect("WebSocket error");
        if let Message::Text(text) = msg {
            return text.as_str().to_string();
        }
    }
}

/// Assert that no text frame arrives within a short window.
async fn assert_silent(ws: &mut WsStream) {
    match tokio::time::timeout(Duration::from_millis(300), ws.next()).await {
        Err(_) => {}
        Ok(Some(Ok(Message::Text(text)))) => panic!("unexpected text frame: {}", text.as_str()),
        Ok(_) => {}
    }
}

/// `#<user>: <message> (YYYY.MM.DD HH:MM:SS)`
fn assert_chat_line(line: &str, user: &str, message: &str) {
    let prefix = format!("#{}: {} (", user, message);
    assert!(line.starts_with(&prefix), "unexpected line {:?}", line);
    let stamp = line[prefix.len()..]
        .strip_suffix(')')
        .expect("line must end with ')'");
    assert!(
        chrono::NaiveDateTime::parse_from_str(stamp, "%Y.%m.%d %H:%M:%S").is_ok(),
        "bad timestamp {:?}",
        stamp
    );
}

#[tokio::test]
async fn test_empty_history_sends_nothing() {
    let (state, addr) = start_test_server().await;

    let mut ws = connect(addr, "A").await;
    wait_for_connections(&state, 1).await;

    assert_silent(&mut ws).await;
}

#[tokio::test]
async fn test_message_is_broadcast_to_everyone_including_sender() {
    let (state, addr) = start_test_server().await;

    let mut a = connect(addr, "A").await;
    let mut b = connect(addr, "B").await;
    wait_for_connections(&state, 2).await;

    a.send(Message::Text("hi".into())).await.unwrap();

    let line_a = next_text(&mut a).await;
    let line_b = next_text(&mut b).await;
    assert_chat_line(&line_a, "A", "hi");
    assert_eq!(line_a, line_b, "every recipient gets the identical line");

    assert_eq!(state.chat.store().count().unwrap(), 1);
}

#[tokio::test]
async fn test_disconnect_notifies_remaining_participants() {
    let (state, addr) = start_test_server().await;

    let mut a = connect(addr, "A").await;
    let mut b = connect(addr, "B").await;
    wait_for_connections(&state, 2).await;

    a.send(Message::Text("hi".into())).await.unwrap();
    next_text(&mut a).await;
    next_text(&mut b).await;

    b.close(None).await.unwrap();
    drop(b);

    assert_eq!(next_text(&mut a).await, "B님의 연결이 끊겼습니다.");
    wait_for_connections(&state, 1).await;
}

#[tokio::test]
async fn test_newcomer_receives_history_oldest_first() {
    let (state, addr) = start_test_server().await;

    let mut a = connect(addr, "A").await;
    wait_for_connections(&state, 1).await;
    for text in ["one", "two", "three"] {
        a.send(Message::Text(text.into())).await.unwrap();
        // Broadcast happens after the insert, so the echo means it is stored.
        assert_chat_line(&next_text(&mut a).await, "A", text);
    }

    let mut c = connect(addr, "C").await;
    for text in ["one", "two", "three"] {
        assert_chat_line(&next_text(&mut c).await, "A", text);
    }
    wait_for_connections(&state, 2).await;
    assert_silent(&mut c).await;
}

#[tokio::test]
async fn test_history_replay_is_capped() {
    let (state, addr) = start_test_server().await;

    let store = state.chat.store();
    for i in 1..=105 {
        store
            .insert(&cohort_server::chat::ChatMessage::new(
                "seed",
                format!("M{}", i),
                "2024.01.01 00:00:00",
            ))
            .unwrap();
    }

    let mut ws = connect(addr, "late").await;
    let first = next_text(&mut ws).await;
    assert_eq!(first, "#seed: M6 (2024.01.01 00:00:00)");
    let mut last = first;
    for _ in 1..100 {
        last = next_text(&mut ws).await;
    }
    assert_eq!(last, "#seed: M105 (2024.01.01 00:00:00)");
    assert_silent(&mut ws).await;
}

#[tokio::test]
async fn test_messages_from_one_sender_keep_order() {
    let (state, addr) = start_test_server().await;

    let mut a = connect(addr, "A").await;
    let mut b = connect(addr, "B").await;
    wait_for_connections(&state, 2).await;

    for i in 0..10 {
        a.send(Message::Text(format!("F{}", i).into())).await.unwrap();
    }
    for i in 0..10 {
        assert_chat_line(&next_text(&mut b).await, "A", &format!("F{}", i));
    }
    assert_eq!(state.chat.store().count().unwrap(), 10);
}

#[tokio::test]
async fn test_binary_frames_are_ignored() {
    let (state, addr) = start_test_server().await;

    let mut a = connect(addr, "A").await;
    wait_for_connections(&state, 1).await;

    a.send(Message::Binary(vec![0xde, 0xad].into())).await.unwrap();
    assert_silent(&mut a).await;
    assert_eq!(state.chat.store().count().unwrap(), 0);

    // Connection stays usable
    a.send(Message::Text("still here".into())).await.unwrap();
    assert_chat_line(&next_text(&mut a).await, "A", "still here");
}

#[tokio::test]
async fn test_empty_text_frame_is_a_message() {
    let (state, addr) = start_test_server().await;

    let mut a = connect(addr, "A").await;
    wait_for_connections(&state, 1).await;

    a.send(Message::Text("".into())).await.unwrap();
    let line = next_text(&mut a).await;
    assert!(line.starts_with("#A:  ("), "unexpected line {:?}", line);
    assert_eq!(state.chat.store().count().unwrap(), 1);
}

#[tokio::test]
async fn test_last_participant_leaving_is_silent() {
    let (state, addr) = start_test_server().await;

    let mut a = connect(addr, "A").await;
    wait_for_connections(&state, 1).await;
    a.close(None).await.unwrap();
    drop(a);

    wait_for_connections(&state, 0).await;
    assert!(state.chat.registry().is_empty());
}

#[tokio::test]
async fn test_two_person_conversation_end_to_end() {
    let (state, addr) = start_test_server().await;
    let store = state.chat.store();

    let mut a = connect(addr, "A").await;
    let mut b = connect(addr, "B").await;
    wait_for_connections(&state, 2).await;

    a.send(Message::Text("hello".into())).await.unwrap();
    assert_chat_line(&next_text(&mut a).await, "A", "hello");
    assert_chat_line(&next_text(&mut b).await, "A", "hello");

    b.close(None).await.unwrap();
    drop(b);
    assert_eq!(next_text(&mut a).await, "B님의 연결이 끊겼습니다.");

    let before = store.count().unwrap();
    a.send(Message::Text("bye".into())).await.unwrap();
    assert_chat_line(&next_text(&mut a).await, "A", "bye");
    assert_eq!(store.count().unwrap(), before + 1);

    let stored = store.recent(1).unwrap();
    assert_eq!(stored[0].user_name, "A");
    assert_eq!(stored[0].message, "bye");
}

#[tokio::test]
async fn test_abrupt_disconnect_releases_slot() {
    let (state, addr) = start_test_server().await;

    let mut a = connect(addr, "A").await;
    let b = connect(addr, "B").await;
    wait_for_connections(&state, 2).await;

    // No close frame: the TCP stream just goes away
    drop(b);

    assert_eq!(next_text(&mut a).await, "B님의 연결이 끊겼습니다.");
    wait_for_connections(&state, 1).await;
}

#[tokio::test]
async fn test_unresponsive_peer_is_dropped_after_pong_timeout() {
    let (state, addr) = start_test_server_with_ping(1).await;

    // `a` keeps reading, so tungstenite answers every ping for it
    let mut a = connect(addr, "A").await;
    // `silent` is never polled and never answers a ping
    let _silent = connect(addr, "silent").await;
    wait_for_connections(&state, 2).await;

    // First ping after 1 s, then 10 s to answer it
    let notice = tokio::time::timeout(Duration::from_secs(20), next_text(&mut a))
        .await
        .expect("unresponsive peer was never dropped");
    assert_eq!(notice, "silent님의 연결이 끊겼습니다.");

    wait_for_connections(&state, 1).await;

    // The responsive peer is still served
    a.send(Message::Text("still here".into())).await.unwrap();
    assert_chat_line(&next_text(&mut a).await, "A", "still here");
}
