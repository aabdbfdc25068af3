//! src/event.rs
//!
//! The typed event stream a node's activity is observed through. Every
//! variant corresponds to one of the protocol's named events.

use crate::domain::PeerId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;

/// The five protocol verbs, used both on the wire (`transport::codec`) and
/// in `Event::Data`/`Event::Sent` to identify which kind of message fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    List,
    Gossip,
    Request,
    Response,
    Votes,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Event {
    /// Every well-formed incoming message, pre-dispatch.
    Data { from: SocketAddr, msg_type: MessageType },
    /// Post-dispatch: a `list` message was merged into the peer table.
    List { from: SocketAddr, peer_count: usize },
    /// Post-dispatch: a `gossip` advertisement was received.
    Gossip { from: SocketAddr, key: String, version: u64 },
    /// Post-dispatch: a `request` for a key's value was received.
    Request { from: SocketAddr, key: String, version: u64 },
    /// Post-dispatch: a `response` carrying a value was received.
    Response { from: SocketAddr, key: String, applied: bool },
    /// Post-dispatch: a `votes` record was merged.
    Votes { from: SocketAddr, topic: String },
    /// Emitted before transmitting an outgoing message.
    Send { to: SocketAddr, msg_type: MessageType },
    /// Emitted after a message was successfully transmitted.
    Sent { to: SocketAddr, msg_type: MessageType },
    /// An election closed because its quorum predicate was satisfied.
    Quorum {
        topic: String,
        results: HashMap<String, usize>,
    },
    /// An election closed because its deadline passed before quorum.
    Deadline { topic: String },
    /// A peer's failure timer fired; it is now considered dead.
    PeerDown { peer: PeerId },
    /// A previously-dead peer sent a revival-qualifying update.
    PeerRevived { peer: PeerId },
}
