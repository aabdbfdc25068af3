//! src/peers.rs
//!
//! The peer table: a map of peer-id to descriptor with liveness and lifetime
//! counters.

use crate::domain::{MergeOutcome, PeerId, PeerInfo};
use rand::Rng;
use std::collections::HashMap;

/// Bounded-retry budget for `random_alive_peer`, so a table dominated by
/// dead peers does unbounded work.
const RANDOM_DRAW_ATTEMPTS: usize = 10;

#[derive(Debug)]
pub struct PeerTable {
    self_id: PeerId,
    peers: HashMap<PeerId, PeerInfo>,
}

impl PeerTable {
    /// Creates a table seeded with the local node's own descriptor, always
    /// present and always alive.
    pub fn new(local: PeerInfo) -> Self {
        let self_id = local.id;
        let mut peers = HashMap::new();
        peers.insert(self_id, local);
        Self { self_id, peers }
    }

    pub fn self_id(&self) -> PeerId {
        self.self_id
    }

    pub fn self_info(&self) -> &PeerInfo {
        self.peers.get(&self.self_id).expect("local descriptor is always present")
    }

    /// Increments the local node's lifetime counter and returns the new
    /// value. Called on every heartbeat tick and on every outgoing send
    /// unconditionally, even for sends that fail.
    pub fn bump_self_lifetime(&mut self) -> u64 {
        let info = self
            .peers
            .get_mut(&self.self_id)
            .expect("local descriptor is always present");
        info.lifetime += 1;
        info.lifetime
    }

    /// Integrates a remote descriptor per the table's merge rules.
    pub fn add_or_merge(&mut self, remote: PeerInfo) -> MergeOutcome {
        match self.peers.get_mut(&remote.id) {
            None => {
                self.peers.insert(remote.id, remote);
                MergeOutcome::Inserted
            }
            Some(local) => {
                if remote.lifetime > local.lifetime {
                    let revived = remote.alive && !local.alive;
                    local.lifetime = remote.lifetime;
                    if remote.alive {
                        local.alive = true;
                    }
                    // Address/port and interval hints travel with the freshest
                    // descriptor so rediscovery after a restart takes effect.
                    local.address = remote.address;
                    local.port = remote.port;
                    local.timeout_ms = remote.timeout_ms;
                    local.heartbeat_interval_ms = remote.heartbeat_interval_ms;
                    local.list_interval_ms = remote.list_interval_ms;
                    local.hash_interval_ms = remote.hash_interval_ms;
                    MergeOutcome::Updated { revived }
                } else {
                    MergeOutcome::Ignored
                }
            }
        }
    }

    pub fn mark_dead(&mut self, id: &PeerId) {
        if let Some(peer) = self.peers.get_mut(id) {
            peer.alive = false;
        }
    }

    pub fn get(&self, id: &PeerId) -> Option<&PeerInfo> {
        self.peers.get(id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerInfo> {
        self.peers.values()
    }

    pub fn snapshot(&self) -> HashMap<PeerId, PeerInfo> {
        self.peers.clone()
    }

    /// Up to ten uniform draws from the keyset, returning the first peer
    /// that is both alive and not self. Returns `None` if no such peer is
    /// found within the draw budget.
    pub fn random_alive_peer(&self) -> Option<&PeerInfo> {
        if self.peers.len() <= 1 {
            return None;
        }
        let ids: Vec<&PeerId> = self.peers.keys().collect();
        let mut rng = rand::thread_rng();
        for _ in 0..RANDOM_DRAW_ATTEMPTS {
            let idx = rng.gen_range(0..ids.len());
            let candidate_id = ids[idx];
            if *candidate_id == self.self_id {
                continue;
            }
            if let Some(candidate) = self.peers.get(candidate_id) {
                if candidate.alive {
                    return Some(candidate);
                }
            }
        }
        None
    }
}
