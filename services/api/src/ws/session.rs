//! Manages the debug WebSocket connection lifecycle.

use super::connection::WsConnection;
use crate::state::AppState;
use axum::{
    extract::{
        State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use duplex_core::{Session, SessionError};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Axum handler to upgrade an HTTP connection to the debug WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.max_message_size(state.config.max_message_bytes)
        .on_upgrade(|socket| handle_socket(socket, state))
}

/// Runs one duplex session on an upgraded socket until it closes.
///
/// Console lines go out to the client; whatever the client sends goes to the
/// configured observation sink.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id: u32 = rand::random();
    tracing::Span::current().record("session_id", session_id);
    info!("New debug WebSocket connection.");

    let handle = Session::new(WsConnection::new(socket))
        .with_parent(&state.shutdown)
        .start(state.console.subscribe(), state.sink.clone());

    match handle.join().await {
        Ok(summary) => info!(
            sent = summary.sent,
            received = summary.received,
            skipped = summary.skipped,
            inbound = ?summary.inbound,
            outbound = ?summary.outbound,
            "Debug session finished."
        ),
        Err(SessionError::Transport(e)) => {
            info!(error = %e, "Debug session ended by transport failure.");
        }
        Err(e) => error!(error = ?e, "Debug session terminated abnormally."),
    }
}
