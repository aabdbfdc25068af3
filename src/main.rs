//! src/main.rs
//!
//! Binary entry point. Initializes tracing, loads configuration,
//! instantiates the main `App`, and runs it.

use anyhow::Context;
use gossip_mesh::{App, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::load().context("Failed to load configuration")?;

    if let Err(e) = App::new(config)?.run().await {
        tracing::error!(error = %e, "Application failed");
        std::process::exit(1);
    }

    Ok(())
}
