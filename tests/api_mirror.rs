//! tests/api_mirror.rs
//!
//! The optional read-only HTTP/WebSocket mirror: a client should see an
//! initial snapshot followed by the node's live event stream.

mod common;

use futures::{SinkExt, StreamExt};
use gossip_mesh::api::protocol::ApiMessage;
use gossip_mesh::{Config, Node};
use std::net::{SocketAddr, TcpListener};
use std::time::Duration;
use test_log::test;
use tokio_tungstenite::{connect_async, tungstenite::Message};

fn ephemeral_addr() -> SocketAddr {
    TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap()
}

#[test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn websocket_client_receives_snapshot_then_events() {
    let mut config = Config::default();
    config.port = ephemeral_addr().port();
    config.heartbeat_interval_ms = 20;
    config.list_interval_ms = 40;
    config.hash_interval_ms = 40;
    let api_addr = ephemeral_addr();
    config.api = Some(gossip_mesh::config::ApiConfig { bind_addr: api_addr });

    let node = Node::listen(config).await.expect("node should start");

    // Give the API server a moment to bind before connecting.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let url = format!("ws://{api_addr}/ws");
    let (mut ws, _) = tokio::time::timeout(Duration::from_secs(3), connect_async(&url))
        .await
        .expect("ws connect timed out")
        .expect("ws connect failed");

    let first = tokio::time::timeout(Duration::from_secs(3), ws.next())
        .await
        .expect("timed out waiting for snapshot")
        .expect("stream ended")
        .expect("ws error");
    let Message::Text(text) = first else { panic!("expected a text frame") };
    let snapshot: ApiMessage = serde_json::from_str(&text).expect("valid json");
    assert!(matches!(snapshot, ApiMessage::Snapshot(_)));

    node.set("x", b"1".to_vec()).await.expect("set should succeed");

    let found_event = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            let msg = ws.next().await.expect("stream ended").expect("ws error");
            if let Message::Text(text) = msg {
                if let Ok(ApiMessage::Event(_)) = serde_json::from_str::<ApiMessage>(&text) {
                    return;
                }
            }
        }
    })
    .await;
    assert!(found_event.is_ok(), "should observe at least one protocol event over the websocket");

    ws.close(None).await.ok();
    node.close().await.expect("node should close cleanly");
}
