//! tests/common/harness.rs
//!
//! Test harness for spinning up in-process clusters of gossip nodes, each
//! bound to an ephemeral TCP port, and for waiting on convergence
//! conditions across the cluster.

use anyhow::{Context, Result};
use gossip_mesh::domain::NetworkState;
use gossip_mesh::event::Event;
use gossip_mesh::{Config, Node};
use std::net::{SocketAddr, TcpListener};
use std::time::Duration;
use tokio::sync::broadcast;

/// A running node bound to an ephemeral port, tuned with short intervals so
/// convergence scenarios complete quickly in tests.
pub struct TestNode {
    pub node: Node,
    pub addr: SocketAddr,
}

impl TestNode {
    pub async fn spawn() -> Result<Self> {
        let mut config = Config::default();
        config.port = ephemeral_port()?;
        config.timeout_ms = 800;
        config.heartbeat_interval_ms = 20;
        config.list_interval_ms = 40;
        config.hash_interval_ms = 40;
        let addr = config.bind_addr();
        let node = Node::listen(config).await.context("failed to start test node")?;
        Ok(Self { node, addr })
    }

    /// Blocks until `predicate` holds against this node's published state,
    /// or `timeout` elapses.
    pub async fn wait_for<F>(&self, predicate: F, timeout: Duration) -> Result<NetworkState>
    where
        F: Fn(&NetworkState) -> bool,
    {
        let mut state_rx = self.node.state();
        tokio::time::timeout(timeout, async {
            loop {
                {
                    let state = state_rx.borrow();
                    if predicate(&state) {
                        return state.clone();
                    }
                }
                if state_rx.changed().await.is_err() {
                    return state_rx.borrow().clone();
                }
            }
        })
        .await
        .context("timed out waiting for state condition")
    }
}

fn ephemeral_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Blocks until an `Event::Quorum` or `Event::Deadline` for `topic` arrives
/// on `events`, returning it.
pub async fn wait_for_election_close(
    events: &mut broadcast::Receiver<Event>,
    topic: &str,
    timeout: Duration,
) -> Result<Event> {
    tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(ref event @ Event::Quorum { topic: ref t, .. }) if t == topic => return Ok(event.clone()),
                Ok(ref event @ Event::Deadline { topic: ref t, .. }) if t == topic => return Ok(event.clone()),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(anyhow::anyhow!("event stream closed before election closed"))
                }
            }
        }
    })
    .await
    .context("timed out waiting for election to close")?
}
