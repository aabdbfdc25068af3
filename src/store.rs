//! src/store.rs
//!
//! The versioned key/value store ("SHash"). Gossip messages carry only
//! `(key, version)` pairs; full values travel only when the receiver
//! declares interest. This bounds per-round bandwidth to one version stamp
//! per key.

use crate::domain::StoreEntry;
use rand::seq::IteratorRandom;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Store {
    entries: HashMap<String, StoreEntry>,
}

impl Store {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Bumps the version and overwrites the entry unconditionally. Returns
    /// the new version.
    pub fn set(&mut self, key: impl Into<String>, value: Vec<u8>) -> u64 {
        let key = key.into();
        let version = self.entries.get(&key).map(|e| e.version + 1).unwrap_or(1);
        self.entries.insert(key, StoreEntry { value, version });
        version
    }

    /// Accepts the incoming `(value, version)` only if `version` is strictly
    /// newer than what is stored; otherwise a no-op. Returns whether the
    /// write was applied.
    pub fn set_unique(&mut self, key: &str, value: Vec<u8>, version: u64) -> bool {
        let is_newer = match self.entries.get(key) {
            Some(existing) => version > existing.version,
            None => true,
        };
        if is_newer {
            self.entries
                .insert(key.to_string(), StoreEntry { value, version });
        }
        is_newer
    }

    pub fn get(&self, key: &str) -> Option<&StoreEntry> {
        self.entries.get(key)
    }

    /// True iff the store would benefit from receiving `(key, incoming_version)`:
    /// the key is absent, or the stored version is older. A key the receiver
    /// lacks is always of interest.
    pub fn interest(&self, key: &str, incoming_version: u64) -> bool {
        match self.entries.get(key) {
            Some(existing) => incoming_version > existing.version,
            None => true,
        }
    }

    /// A uniformly chosen `(key, version)` pair, or `None` if the store is
    /// empty.
    pub fn random_pair(&self) -> Option<(String, u64)> {
        let mut rng = rand::thread_rng();
        self.entries
            .iter()
            .choose(&mut rng)
            .map(|(key, entry)| (key.clone(), entry.version))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_bumps_version_on_each_write() {
        let mut store = Store::new();
        assert_eq!(store.set("x", b"1".to_vec()), 1);
        assert_eq!(store.set("x", b"2".to_vec()), 2);
        assert_eq!(store.get("x").unwrap().value, b"2".to_vec());
    }

    #[test]
    fn set_unique_rejects_stale_versions() {
        let mut store = Store::new();
        store.set_unique("x", b"new".to_vec(), 5);
        assert!(!store.set_unique("x", b"stale".to_vec(), 3));
        assert_eq!(store.get("x").unwrap().value, b"new".to_vec());
        assert!(!store.set_unique("x", b"same".to_vec(), 5));
        assert!(store.set_unique("x", b"newer".to_vec(), 6));
        assert_eq!(store.get("x").unwrap().value, b"newer".to_vec());
    }

    #[test]
    fn interest_is_true_for_absent_key() {
        let store = Store::new();
        assert!(store.interest("missing", 0));
    }

    #[test]
    fn interest_compares_against_stored_version() {
        let mut store = Store::new();
        store.set_unique("x", b"v".to_vec(), 10);
        assert!(!store.interest("x", 10));
        assert!(!store.interest("x", 5));
        assert!(store.interest("x", 11));
    }

    #[test]
    fn random_pair_is_none_when_empty() {
        let store = Store::new();
        assert!(store.random_pair().is_none());
    }

    #[test]
    fn random_pair_returns_a_known_key() {
        let mut store = Store::new();
        store.set("a", b"1".to_vec());
        store.set("b", b"2".to_vec());
        let (key, version) = store.random_pair().unwrap();
        assert!(key == "a" || key == "b");
        assert_eq!(version, store.get(&key).unwrap().version);
    }
}
