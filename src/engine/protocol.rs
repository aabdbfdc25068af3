//! src/engine/protocol.rs
//!
//! Pure message-dispatch helpers, kept free of engine state and async
//! machinery so the verb semantics can be unit tested without a runtime.

use crate::store::Store;
use crate::transport::codec::Envelope;
use std::collections::HashMap;

/// The same-connection reply to a `gossip` advertisement, if the receiver
/// is interested in the advertised `(key, version)`.
pub fn gossip_reply(store: &Store, key: &str, version: u64) -> Option<Envelope> {
    if store.interest(key, version) {
        Some(Envelope::request(key.to_string(), version))
    } else {
        None
    }
}

/// The reply to a `request`: the current value and version for `key`, or an
/// absent value (still carrying the requester's version) if the key is
/// unknown locally.
pub fn request_reply(store: &Store, key: &str, requested_version: u64) -> Envelope {
    match store.get(key) {
        Some(entry) => Envelope::response(key.to_string(), Some(entry.value.clone()), entry.version),
        None => Envelope::response(key.to_string(), None, requested_version),
    }
}

/// Lossily renders a byte-keyed vote tally as a string-keyed one for the
/// `quorum`/`deadline` events, which are JSON-facing.
pub fn tally_to_strings(tally: &HashMap<Vec<u8>, usize>) -> HashMap<String, usize> {
    tally
        .iter()
        .map(|(value, count)| (String::from_utf8_lossy(value).into_owned(), *count))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gossip_reply_is_none_without_interest() {
        let mut store = Store::new();
        store.set_unique("x", b"v".to_vec(), 5);
        assert!(gossip_reply(&store, "x", 5).is_none());
        assert!(gossip_reply(&store, "x", 4).is_none());
    }

    #[test]
    fn gossip_reply_requests_when_interested() {
        let store = Store::new();
        let reply = gossip_reply(&store, "x", 1).expect("store has no x, so it is interested");
        match reply.data {
            crate::transport::codec::MessagePayload::Request { key, version } => {
                assert_eq!(key, "x");
                assert_eq!(version, 1);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn request_reply_carries_the_stored_value_and_version() {
        let mut store = Store::new();
        store.set_unique("x", b"v".to_vec(), 5);
        let reply = request_reply(&store, "x", 1);
        match reply.data {
            crate::transport::codec::MessagePayload::Response { key, value, version } => {
                assert_eq!(key, "x");
                assert_eq!(value, Some(b"v".to_vec()));
                assert_eq!(version, 5);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn request_reply_falls_back_to_requested_version_when_absent() {
        let store = Store::new();
        let reply = request_reply(&store, "missing", 3);
        match reply.data {
            crate::transport::codec::MessagePayload::Response { value, version, .. } => {
                assert_eq!(value, None);
                assert_eq!(version, 3);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn tally_to_strings_renders_utf8_values() {
        let mut tally = HashMap::new();
        tally.insert(b"a".to_vec(), 2usize);
        let rendered = tally_to_strings(&tally);
        assert_eq!(rendered.get("a"), Some(&2));
    }
}
