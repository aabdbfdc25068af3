//! src/app.rs
//!
//! The binary-lifecycle wrapper: loads a `Node` from configuration, waits
//! for a shutdown signal, and closes it down gracefully.

use crate::{config::Config, error::Result, node::Node};

pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self { config })
    }

    /// Starts listening, then blocks until Ctrl+C, then closes the node.
    pub async fn run(self) -> Result<()> {
        tracing::info!(bind_addr = %self.config.bind_addr(), "Starting node...");

        let node = Node::listen(self.config).await?;

        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        tracing::info!("Ctrl+C received. Initiating graceful shutdown...");

        node.close().await?;
        tracing::info!("Node has shut down gracefully.");

        Ok(())
    }
}
