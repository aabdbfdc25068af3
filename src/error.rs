//! src/error.rs
//!
//! Defines the library's custom, comprehensive `Error` enum using `thiserror`.

use std::net::SocketAddr;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize or deserialize: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Tokio task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Failed to connect to {0}: {1}")]
    ConnectFailed(SocketAddr, #[source] std::io::Error),

    #[error("Message exceeded the maximum allowed frame size of {0} bytes")]
    FrameTooLarge(usize),

    #[error("API server error: {0}")]
    ApiServer(#[from] axum::Error),

    #[error("The engine task is no longer running")]
    EngineGone,
}
