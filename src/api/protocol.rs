//! src/api/protocol.rs
//!
//! The wire contract for the read-only WebSocket mirror: a tagged enum so
//! clients can distinguish the initial snapshot from the subsequent event
//! stream without out-of-band knowledge.

use crate::domain::NetworkState;
use crate::event::Event;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ApiMessage {
    Snapshot(NetworkState),
    Event(Event),
}
