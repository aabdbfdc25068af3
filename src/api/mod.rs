//! src/api/mod.rs
//!
//! The optional `ApiServer`: a read-only HTTP/WebSocket mirror of a node's
//! state and event stream. Not part of the gossip protocol itself, and
//! never the only way to drive a node; `Node`'s own methods remain the
//! primary interface.

use crate::domain::NetworkState;
use crate::error::Result;
use crate::event::Event;
use axum::{extract::State, routing::get, Json, Router};
use std::net::SocketAddr;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

pub mod protocol;
pub mod ws;

/// The shared state accessible by all Axum handlers.
#[derive(Clone)]
pub struct ApiState {
    pub state_rx: watch::Receiver<NetworkState>,
    pub event_tx: broadcast::Sender<Event>,
}

pub struct ApiServer {
    bind_addr: SocketAddr,
    state_rx: watch::Receiver<NetworkState>,
    event_tx: broadcast::Sender<Event>,
}

impl ApiServer {
    pub fn new(
        bind_addr: SocketAddr,
        state_rx: watch::Receiver<NetworkState>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self { bind_addr, state_rx, event_tx }
    }

    pub async fn run(self, shutdown_token: CancellationToken) -> Result<()> {
        let state = ApiState { state_rx: self.state_rx, event_tx: self.event_tx };

        let app = Router::new()
            .route("/state", get(get_state))
            .route("/ws", get(ws::websocket_handler))
            .with_state(state);

        tracing::info!(listen_addr = %self.bind_addr, "API server listening");

        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_token.cancelled().await;
                tracing::info!("API server received shutdown signal.");
            })
            .await?;

        Ok(())
    }
}

async fn get_state(State(state): State<ApiState>) -> Json<NetworkState> {
    Json(state.state_rx.borrow().clone())
}
