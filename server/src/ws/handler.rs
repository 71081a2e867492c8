use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::state::AppState;
use crate::ws::actor;

/// GET /chat/{name}
/// WebSocket upgrade endpoint. The display name comes from the path and is
/// not authenticated.
pub async fn chat_upgrade(
    State(state): State<AppState>,
    Path(name): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let name = name.trim().to_string();
    if name.is_empty() {
        return (StatusCode::BAD_REQUEST, "display name required").into_response();
    }

    tracing::info!(user = %name, "Chat connection requested");
    let room = state.chat.clone();
    ws.on_upgrade(move |socket| actor::run_connection(socket, room, name))
}
