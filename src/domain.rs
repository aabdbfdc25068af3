//! src/domain.rs
//!
//! Consolidates the core data structures shared across the peer table, the
//! versioned store, and the ballot box. This module is the single source of
//! truth for the application's domain model.

use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt,
    net::IpAddr,
};
use uuid::Uuid;

/// Opaque 128-bit identifier for a participating node. Stable for the
/// lifetime of the process; generation is a bare `Uuid::new_v4`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(Uuid);

impl PeerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer::{}", &self.0.simple().to_string()[..8])
    }
}

impl From<Uuid> for PeerId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A peer's full descriptor, as carried in `list` messages and stored in the
/// peer table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: PeerId,
    pub address: IpAddr,
    pub port: u16,
    pub alive: bool,
    pub lifetime: u64,
    pub timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub list_interval_ms: u64,
    pub hash_interval_ms: u64,
}

impl PeerInfo {
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::new(self.address, self.port)
    }
}

/// A single entry in the versioned store: a value and the version it was
/// last written at.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub value: Vec<u8>,
    pub version: u64,
}

/// Threshold predicate used by the ballot box to decide whether an election
/// can close.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Quorum {
    /// Closes once `votes.len()` reaches this absolute count.
    Count(usize),
    /// Closes once `votes.len() as f64 / known_peers as f64` reaches this
    /// fraction (0.0..=1.0).
    Fraction(f64),
}

impl Quorum {
    pub fn is_satisfied(&self, vote_count: usize, known_peers: usize) -> bool {
        match *self {
            Quorum::Count(n) => vote_count >= n,
            Quorum::Fraction(f) => {
                if known_peers == 0 {
                    vote_count > 0 && f <= 0.0
                } else {
                    (vote_count as f64 / known_peers as f64) >= f
                }
            }
        }
    }
}

/// A single voter's cast ballot: the value voted for and the voter-local
/// logical clock ("vote-lifetime") at the time of voting. Used to resolve
/// merge conflicts per voter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ballot {
    pub value: Vec<u8>,
    pub vote_lifetime: u64,
}

/// Options supplied when registering a new election.
#[derive(Clone, Debug)]
pub struct ElectionOptions {
    pub topic: String,
    pub origin: PeerId,
    pub quorum: Quorum,
    pub expires: Option<std::time::Instant>,
    pub value: Option<Vec<u8>>,
}

/// A per-topic election record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Election {
    pub topic: String,
    pub origin: PeerId,
    pub votes: HashMap<PeerId, Ballot>,
    pub quorum: Quorum,
    #[serde(with = "instant_as_millis_opt")]
    pub expires: Option<std::time::Instant>,
    pub closed: bool,
    pub expired: bool,
    pub results: Option<HashMap<Vec<u8>, usize>>,
}

impl Election {
    pub fn new(opts: ElectionOptions) -> Self {
        let mut votes = HashMap::new();
        if let Some(value) = opts.value {
            votes.insert(opts.origin, Ballot { value, vote_lifetime: 0 });
        }
        Self {
            topic: opts.topic,
            origin: opts.origin,
            votes,
            quorum: opts.quorum,
            expires: opts.expires,
            closed: false,
            expired: false,
            results: None,
        }
    }

    pub fn is_past_deadline(&self, now: std::time::Instant) -> bool {
        matches!(self.expires, Some(deadline) if now >= deadline)
    }

    /// Tally votes by value; ties broken by lexicographic value order so
    /// independent deciders converge on the same winner.
    pub fn tally(&self) -> HashMap<Vec<u8>, usize> {
        let mut counts: HashMap<Vec<u8>, usize> = HashMap::new();
        for ballot in self.votes.values() {
            *counts.entry(ballot.value.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Outcome of a call to [`crate::ballot::BallotBox::vote`]. The authoritative
/// terminal notification is the `quorum`/`deadline` event, not this return
/// value, which only mirrors the ballot box's current closed status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoteOutcome {
    pub closed: bool,
    pub expired: bool,
}

/// Result of [`crate::peers::PeerTable::add_or_merge`], used by the engine to
/// decide whether to (re)arm a failure timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The peer was not previously known; a failure timer should be armed.
    Inserted,
    /// The peer was known and its lifetime advanced; `revived` is true if it
    /// was dead and this merge brought it back, in which case the failure
    /// timer should be reset.
    Updated { revived: bool },
    /// The incoming descriptor carried a lifetime no greater than the local
    /// one and was discarded.
    Ignored,
}

/// A point-in-time snapshot of node state, for the ambient HTTP/WebSocket
/// mirror (not part of the gossip protocol itself).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NetworkState {
    pub self_id: Option<PeerId>,
    pub peers: HashMap<PeerId, PeerInfo>,
    pub keys: Vec<String>,
}

/// (De)serializes `Option<Instant>` as milliseconds remaining from "now",
/// since `Instant` has no stable epoch. Only used for the HTTP mirror; wire
/// messages never carry raw `Instant`s (see `transport::codec`).
mod instant_as_millis_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, Instant};

    pub fn serialize<S: Serializer>(
        value: &Option<Instant>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let millis = value.map(|deadline| {
            deadline
                .saturating_duration_since(Instant::now())
                .as_millis() as u64
        });
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Instant>, D::Error> {
        let millis: Option<u64> = Option::deserialize(deserializer)?;
        Ok(millis.map(|m| Instant::now() + Duration::from_millis(m)))
    }
}
