//! src/ballot.rs
//!
//! The ballot box: per-topic elections with merge, quorum, and deadline
//! rules.

use crate::domain::{Ballot, Election, ElectionOptions, PeerId, VoteOutcome};
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Default)]
pub struct BallotBox {
    elections: HashMap<String, Election>,
}

impl BallotBox {
    pub fn new() -> Self {
        Self { elections: HashMap::new() }
    }

    /// Registers a new election. A topic identifies an election across
    /// peers; registering an already-known topic replaces the local record
    /// (the caller is expected to `merge` instead when integrating a remote
    /// record).
    pub fn election(&mut self, opts: ElectionOptions) -> &Election {
        let topic = opts.topic.clone();
        let election = Election::new(opts);
        self.elections.insert(topic.clone(), election);
        self.elections.get(&topic).expect("just inserted")
    }

    pub fn get(&self, topic: &str) -> Option<&Election> {
        self.elections.get(topic)
    }

    pub fn topics(&self) -> impl Iterator<Item = &String> {
        self.elections.keys()
    }

    /// Records a ballot. A no-op (returning the current closed status) if
    /// the election doesn't exist or is already closed.
    pub fn vote(
        &mut self,
        voter: PeerId,
        topic: &str,
        value: Vec<u8>,
        vote_lifetime: u64,
    ) -> VoteOutcome {
        match self.elections.get_mut(topic) {
            None => VoteOutcome { closed: false, expired: false },
            Some(election) => {
                if election.closed {
                    return VoteOutcome { closed: true, expired: election.expired };
                }
                upsert_ballot(&mut election.votes, voter, Ballot { value, vote_lifetime });
                VoteOutcome { closed: election.closed, expired: election.expired }
            }
        }
    }

    /// Integrates an incoming election record into the local one. Per
    /// voter, keeps the ballot with the higher vote-lifetime, breaking ties
    /// by lexicographic ballot value. If the incoming record is closed and
    /// the local one is not, adopts the closed state.
    ///
    /// If `topic` is unknown locally, the incoming record is adopted as-is
    /// (there is nothing local to merge into).
    pub fn merge(&mut self, topic: &str, incoming: Election) {
        match self.elections.get_mut(topic) {
            None => {
                self.elections.insert(topic.to_string(), incoming);
            }
            Some(local) => {
                for (voter, ballot) in incoming.votes {
                    upsert_ballot(&mut local.votes, voter, ballot);
                }
                if incoming.closed && !local.closed {
                    local.closed = true;
                    local.expired = incoming.expired;
                    local.results = incoming.results.or_else(|| Some(local.tally()));
                }
            }
        }
    }

    /// Evaluates the quorum predicate; if satisfied, marks the election
    /// closed, computes `results`, and returns true. `known_peers` is the
    /// caller's current count of known peers, needed for `Quorum::Fraction`.
    pub fn decide(&mut self, topic: &str, known_peers: usize) -> bool {
        match self.elections.get_mut(topic) {
            None => false,
            Some(election) => {
                if election.closed {
                    return false;
                }
                if election.quorum.is_satisfied(election.votes.len(), known_peers) {
                    election.closed = true;
                    election.expired = false;
                    election.results = Some(election.tally());
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Closes any election whose deadline has passed and has not already
    /// closed by quorum. Returns the topics that transitioned to
    /// `CLOSED(expired)` in this call, for the caller to surface as
    /// `deadline` events.
    pub fn expire_overdue(&mut self, now: Instant) -> Vec<String> {
        let mut expired_topics = Vec::new();
        for (topic, election) in self.elections.iter_mut() {
            if !election.closed && election.is_past_deadline(now) {
                election.closed = true;
                election.expired = true;
                election.results = Some(election.tally());
                expired_topics.push(topic.clone());
            }
        }
        expired_topics
    }
}

/// Keeps the ballot with the higher vote-lifetime for a given voter;
/// ties are broken by lexicographic ballot value so every peer deciding
/// independently reaches the same result.
fn upsert_ballot(votes: &mut HashMap<PeerId, Ballot>, voter: PeerId, incoming: Ballot) {
    match votes.get(&voter) {
        None => {
            votes.insert(voter, incoming);
        }
        Some(existing) => {
            let replace = match incoming.vote_lifetime.cmp(&existing.vote_lifetime) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Less => false,
                std::cmp::Ordering::Equal => incoming.value > existing.value,
            };
            if replace {
                votes.insert(voter, incoming);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Quorum;

    fn options(topic: &str, quorum: Quorum) -> ElectionOptions {
        ElectionOptions {
            topic: topic.to_string(),
            origin: PeerId::new(),
            quorum,
            expires: None,
            value: None,
        }
    }

    #[test]
    fn vote_on_unknown_topic_is_a_no_op() {
        let mut box_ = BallotBox::new();
        let outcome = box_.vote(PeerId::new(), "missing", b"a".to_vec(), 1);
        assert_eq!(outcome, VoteOutcome { closed: false, expired: false });
    }

    #[test]
    fn vote_on_closed_election_is_a_no_op() {
        let mut box_ = BallotBox::new();
        box_.election(options("t", Quorum::Count(1)));
        let voter = PeerId::new();
        box_.vote(voter, "t", b"a".to_vec(), 1);
        assert!(box_.decide("t", 3));

        let outcome = box_.vote(PeerId::new(), "t", b"b".to_vec(), 1);
        assert_eq!(outcome, VoteOutcome { closed: true, expired: false });
        assert_eq!(box_.get("t").unwrap().votes.len(), 1);
    }

    #[test]
    fn decide_closes_on_quorum_and_tallies_results() {
        let mut box_ = BallotBox::new();
        box_.election(options("leader", Quorum::Count(2)));
        box_.vote(PeerId::new(), "leader", b"a".to_vec(), 1);
        assert!(!box_.decide("leader", 3));
        box_.vote(PeerId::new(), "leader", b"a".to_vec(), 1);
        assert!(box_.decide("leader", 3));

        let election = box_.get("leader").unwrap();
        assert!(election.closed);
        assert!(!election.expired);
        assert_eq!(election.results.as_ref().unwrap().get(&b"a".to_vec()), Some(&2));
    }

    #[test]
    fn merge_keeps_highest_vote_lifetime_per_voter() {
        let mut box_ = BallotBox::new();
        box_.election(options("t", Quorum::Count(10)));
        let voter = PeerId::new();
        box_.vote(voter, "t", b"old".to_vec(), 1);

        let mut incoming = box_.get("t").unwrap().clone();
        incoming.votes.insert(voter, Ballot { value: b"stale".to_vec(), vote_lifetime: 0 });
        box_.merge("t", incoming);
        assert_eq!(box_.get("t").unwrap().votes.get(&voter).unwrap().value, b"old".to_vec());

        let mut incoming = box_.get("t").unwrap().clone();
        incoming.votes.insert(voter, Ballot { value: b"new".to_vec(), vote_lifetime: 5 });
        box_.merge("t", incoming);
        assert_eq!(box_.get("t").unwrap().votes.get(&voter).unwrap().value, b"new".to_vec());
    }

    #[test]
    fn merge_breaks_lifetime_ties_lexicographically() {
        let mut box_ = BallotBox::new();
        box_.election(options("t", Quorum::Count(10)));
        let voter = PeerId::new();
        box_.vote(voter, "t", b"aaa".to_vec(), 3);

        let mut incoming = box_.get("t").unwrap().clone();
        incoming.votes.insert(voter, Ballot { value: b"zzz".to_vec(), vote_lifetime: 3 });
        box_.merge("t", incoming);
        assert_eq!(box_.get("t").unwrap().votes.get(&voter).unwrap().value, b"zzz".to_vec());
    }

    #[test]
    fn merge_adopts_closed_state_from_incoming() {
        let mut box_ = BallotBox::new();
        box_.election(options("t", Quorum::Count(1)));

        let mut incoming = box_.get("t").unwrap().clone();
        incoming.closed = true;
        incoming.expired = false;
        incoming.results = Some(HashMap::from([(b"a".to_vec(), 1)]));
        box_.merge("t", incoming);

        let election = box_.get("t").unwrap();
        assert!(election.closed);
        assert!(!election.expired);
        assert!(election.results.is_some());
    }

    #[test]
    fn merge_is_idempotent() {
        let mut box_ = BallotBox::new();
        box_.election(options("t", Quorum::Count(10)));
        box_.vote(PeerId::new(), "t", b"a".to_vec(), 1);
        let snapshot = box_.get("t").unwrap().clone();

        box_.merge("t", snapshot.clone());
        let after = box_.get("t").unwrap();
        assert_eq!(after.votes.len(), snapshot.votes.len());
        assert_eq!(after.closed, snapshot.closed);
    }

    #[test]
    fn expire_overdue_closes_past_deadline_elections_once() {
        let mut box_ = BallotBox::new();
        let now = Instant::now();
        let mut opts = options("t", Quorum::Count(10));
        opts.expires = Some(now);
        box_.election(opts);

        let later = now + std::time::Duration::from_millis(1);
        let expired = box_.expire_overdue(later);
        assert_eq!(expired, vec!["t".to_string()]);
        assert!(box_.get("t").unwrap().closed);
        assert!(box_.get("t").unwrap().expired);

        assert!(box_.expire_overdue(later).is_empty());
    }

    #[test]
    fn a_closed_election_accepts_no_further_votes() {
        let mut box_ = BallotBox::new();
        let now = Instant::now();
        let mut opts = options("t", Quorum::Count(10));
        opts.expires = Some(now);
        box_.election(opts);
        box_.expire_overdue(now + std::time::Duration::from_millis(1));

        box_.vote(PeerId::new(), "t", b"late".to_vec(), 99);
        assert!(box_.get("t").unwrap().votes.is_empty());
    }
}
