//! src/api/ws.rs
//!
//! WebSocket connection handling for the state mirror: sends an initial
//! snapshot, then forwards the node's event stream.

use crate::api::protocol::ApiMessage;
use crate::api::ApiState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: ApiState) {
    tracing::info!("New WebSocket client connected.");

    let snapshot = ApiMessage::Snapshot(state.state_rx.borrow().clone());
    let Ok(snapshot_json) = serde_json::to_string(&snapshot) else {
        tracing::error!("Failed to serialize initial snapshot");
        return;
    };
    if socket.send(Message::Text(snapshot_json)).await.is_err() {
        tracing::warn!("Failed to send initial snapshot to WebSocket client. Closing.");
        return;
    }

    let mut event_rx = state.event_tx.subscribe();

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "WebSocket client lagged behind the event stream");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };
                let message = ApiMessage::Event(event);
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize event");
                        continue;
                    }
                };
                if socket.send(Message::Text(json)).await.is_err() {
                    tracing::info!("WebSocket client disconnected.");
                    break;
                }
            }
            Some(Ok(msg)) = socket.recv() => {
                if let Message::Close(_) = msg {
                    tracing::info!("WebSocket client sent close message.");
                    break;
                }
            }
            else => {
                tracing::info!("WebSocket connection closed or event channel dropped.");
                break;
            }
        }
    }
}
