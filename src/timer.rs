//! src/timer.rs
//!
//! The failure-detector timer registry: named one-shot timers keyed by peer
//! identity.
//!
//! Implemented as a plain deadline map rather than a `DelayQueue`: the
//! engine already runs a short periodic tick for its own emitters, so
//! piggybacking an `expired()` scan on that tick keeps the registry a
//! passive, easily-tested data structure with no task of its own.

use crate::domain::PeerId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct TimerRegistry {
    deadlines: HashMap<PeerId, Instant>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self { deadlines: HashMap::new() }
    }

    /// Arms a one-shot timer for `id`, cancelling any prior timer for the
    /// same peer.
    pub fn arm(&mut self, id: PeerId, timeout: Duration, now: Instant) {
        self.deadlines.insert(id, now + timeout);
    }

    pub fn cancel(&mut self, id: &PeerId) {
        self.deadlines.remove(id);
    }

    /// Idempotent teardown: clears every pending timer.
    pub fn clear(&mut self) {
        self.deadlines.clear();
    }

    /// Drains and returns the ids of every timer whose deadline has passed
    /// as of `now`. Each returned timer is removed (one-shot).
    pub fn expired(&mut self, now: Instant) -> Vec<PeerId> {
        let expired: Vec<PeerId> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            self.deadlines.remove(id);
        }
        expired
    }

    pub fn is_armed(&self, id: &PeerId) -> bool {
        self.deadlines.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_replaces_any_prior_timer_for_the_same_peer() {
        let mut registry = TimerRegistry::new();
        let id = PeerId::new();
        let now = Instant::now();
        registry.arm(id, Duration::from_millis(10), now);
        registry.arm(id, Duration::from_millis(1000), now);
        assert_eq!(registry.len(), 1);
        assert!(registry.expired(now + Duration::from_millis(500)).is_empty());
    }

    #[test]
    fn expired_drains_one_shot() {
        let mut registry = TimerRegistry::new();
        let id = PeerId::new();
        let now = Instant::now();
        registry.arm(id, Duration::from_millis(10), now);

        let fired = registry.expired(now + Duration::from_millis(11));
        assert_eq!(fired, vec![id]);
        assert!(!registry.is_armed(&id));
        assert!(registry.expired(now + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn cancel_prevents_future_expiry() {
        let mut registry = TimerRegistry::new();
        let id = PeerId::new();
        let now = Instant::now();
        registry.arm(id, Duration::from_millis(10), now);
        registry.cancel(&id);
        assert!(registry.expired(now + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn clear_is_idempotent() {
        let mut registry = TimerRegistry::new();
        registry.arm(PeerId::new(), Duration::from_millis(10), Instant::now());
        registry.clear();
        assert!(registry.is_empty());
        registry.clear();
        assert!(registry.is_empty());
    }
}
