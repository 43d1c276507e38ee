//! # WebSocket Upgrade Handlers
//!
//! The two entry points named in §6.2. Each upgrades the HTTP
//! connection and hands the resulting socket to the matching session
//! state machine. Session cleanup on any exit path, including a panic
//! (§4.8), is the job of the `Drop` guard each state machine
//! constructs internally — not of this module.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use tracing::info;

use crate::session::{agent, client};
use crate::state::AppState;

/// Cap on a single WebSocket text frame (§6.1). The payload itself is
/// base64, which inflates raw bytes by ~4/3, plus the `{"inner":
/// {"kind": "tcp_data", ...}}` envelope around it — so a 1 MiB raw TCP
/// read needs headroom well past 1 MiB on the wire. Sized generously
/// above that so a full 1 MiB agent-side read always fits in one frame.
const MAX_FRAME_SIZE: usize = 2 * 1024 * 1024;

/// `GET /ws_for_edge_agents` — upgrade path for edge agents.
pub async fn ws_for_edge_agents(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.max_frame_size(MAX_FRAME_SIZE)
        .max_message_size(MAX_FRAME_SIZE)
        .on_upgrade(move |socket| async move {
            info!("edge agent connected");
            agent::run_agent_session(socket, state).await;
        })
}

/// `GET /ws_for_access_clients` — upgrade path for access clients.
pub async fn ws_for_access_clients(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.max_frame_size(MAX_FRAME_SIZE)
        .max_message_size(MAX_FRAME_SIZE)
        .on_upgrade(move |socket| async move {
            info!("access client connected");
            client::run_access_client_session(socket, state).await;
        })
}
