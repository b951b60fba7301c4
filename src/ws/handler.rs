//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::serve_connection;
use crate::app_state::AppState;

/// `GET /api/v1/ws`: Upgrade to a push connection.
///
/// Frames larger than the configured limit close the connection.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let hub = state.hub.clone();
    let max_bytes = hub.config().max_message_bytes;

    ws.max_message_size(max_bytes)
        .max_frame_size(max_bytes)
        .on_upgrade(move |socket| serve_connection(socket, hub))
}
