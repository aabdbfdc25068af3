//! src/engine/mod.rs
//!
//! The gossip engine: owns the peer table, store, ballot box, and timer
//! registry exclusively, and drives the periodic emitters and message
//! handlers that implement the protocol's verbs.

pub mod protocol;

use crate::ballot::BallotBox;
use crate::domain::{MergeOutcome, NetworkState, PeerId, PeerInfo};
use crate::event::Event;
use crate::node::NodeCommand;
use crate::peers::PeerTable;
use crate::store::Store;
use crate::timer::TimerRegistry;
use crate::transport::codec::{Envelope, MessagePayload};
use crate::transport::{InboundMessage, TransportCommand};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time;
use tokio_util::sync::CancellationToken;

/// How often the engine scans the timer registry for expired failure
/// timers. Independent of any configured interval, since it only needs to
/// be finer-grained than the shortest configured timeout.
const TIMER_SCAN_INTERVAL: Duration = Duration::from_millis(50);

pub struct Engine {
    peers: PeerTable,
    store: Store,
    ballots: BallotBox,
    timers: TimerRegistry,
    inbound_rx: mpsc::Receiver<InboundMessage>,
    command_rx: mpsc::Receiver<NodeCommand>,
    transport_tx: mpsc::Sender<TransportCommand>,
    event_tx: broadcast::Sender<Event>,
    state_tx: watch::Sender<NetworkState>,
}

impl Engine {
    pub fn new(
        self_info: PeerInfo,
        initial_peers: HashMap<PeerId, PeerInfo>,
        inbound_rx: mpsc::Receiver<InboundMessage>,
        command_rx: mpsc::Receiver<NodeCommand>,
        transport_tx: mpsc::Sender<TransportCommand>,
        event_tx: broadcast::Sender<Event>,
        state_tx: watch::Sender<NetworkState>,
    ) -> Self {
        let mut peers = PeerTable::new(self_info);
        let mut timers = TimerRegistry::new();
        let now = Instant::now();
        for (_, info) in initial_peers {
            let timeout_ms = info.timeout_ms;
            if let MergeOutcome::Inserted = peers.add_or_merge(info.clone()) {
                timers.arm(info.id, Duration::from_millis(timeout_ms), now);
            }
        }

        Self {
            peers,
            store: Store::new(),
            ballots: BallotBox::new(),
            timers,
            inbound_rx,
            command_rx,
            transport_tx,
            event_tx,
            state_tx,
        }
    }

    pub async fn run(mut self, shutdown_token: CancellationToken) {
        tracing::info!(peer_id = %self.peers.self_id(), "Engine service started");

        let mut heartbeat_timer = time::interval(Duration::from_millis(self.peers.self_info().heartbeat_interval_ms));
        let mut list_timer = time::interval(Duration::from_millis(self.peers.self_info().list_interval_ms));
        let mut hash_timer = time::interval(Duration::from_millis(self.peers.self_info().hash_interval_ms));
        let mut timer_scan = time::interval(TIMER_SCAN_INTERVAL);

        self.publish_state();

        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    tracing::info!("Engine service received shutdown signal.");
                    self.timers.clear();
                    break;
                },
                _ = heartbeat_timer.tick() => {
                    self.peers.bump_self_lifetime();
                },
                _ = list_timer.tick() => {
                    self.emit_list().await;
                },
                _ = hash_timer.tick() => {
                    self.emit_gossip().await;
                },
                _ = timer_scan.tick() => {
                    self.scan_failure_timers();
                    self.scan_election_deadlines();
                },
                Some(inbound) = self.inbound_rx.recv() => {
                    self.handle_inbound(inbound).await;
                },
                Some(command) = self.command_rx.recv() => {
                    self.handle_command(command).await;
                }
                else => {
                    tracing::info!("Channel closed. Engine service shutting down.");
                    break;
                }
            }
        }
    }

    // -- Periodic emitters --

    async fn emit_list(&mut self) {
        let Some(target) = self.peers.random_alive_peer().cloned() else {
            return;
        };
        let envelope = Envelope::list(self.peers.snapshot());
        self.send(target.socket_addr(), envelope).await;
    }

    async fn emit_gossip(&mut self) {
        let Some((key, version)) = self.store.random_pair() else {
            return;
        };
        let Some(target) = self.peers.random_alive_peer().cloned() else {
            return;
        };
        let envelope = Envelope::gossip(key, version);
        self.send(target.socket_addr(), envelope).await;
    }

    fn scan_failure_timers(&mut self) {
        let expired = self.timers.expired(Instant::now());
        if expired.is_empty() {
            return;
        }
        for id in expired {
            self.peers.mark_dead(&id);
            let _ = self.event_tx.send(Event::PeerDown { peer: id });
        }
        self.publish_state();
    }

    /// Closes any election whose deadline has passed without quorum.
    fn scan_election_deadlines(&mut self) {
        let expired_topics = self.ballots.expire_overdue(Instant::now());
        for topic in expired_topics {
            self.emit_terminal_event(&topic);
        }
    }

    // -- Inbound message handling --

    async fn handle_inbound(&mut self, inbound: InboundMessage) {
        let InboundMessage { peer_addr, envelope, reply_tx } = inbound;
        let _ = self.event_tx.send(Event::Data { from: peer_addr, msg_type: envelope.meta.msg_type });

        let reply = match envelope.data {
            MessagePayload::List(remote_peers) => {
                self.handle_list(peer_addr, remote_peers);
                None
            }
            MessagePayload::Gossip { key, version } => {
                let reply = protocol::gossip_reply(&self.store, &key, version);
                let _ = self.event_tx.send(Event::Gossip { from: peer_addr, key, version });
                reply
            }
            MessagePayload::Request { key, version } => {
                let reply = protocol::request_reply(&self.store, &key, version);
                let _ = self.event_tx.send(Event::Request { from: peer_addr, key, version });
                Some(reply)
            }
            MessagePayload::Response { key, value, version } => {
                let applied = match value {
                    Some(value) => self.store.set_unique(&key, value, version),
                    None => false,
                };
                let _ = self.event_tx.send(Event::Response { from: peer_addr, key, applied });
                None
            }
            MessagePayload::Votes { topic, election } => {
                self.handle_votes(peer_addr, topic, election).await;
                None
            }
        };

        if let Some(ref envelope) = reply {
            let _ = self.event_tx.send(Event::Send { to: peer_addr, msg_type: envelope.meta.msg_type });
        }
        let _ = reply_tx.send(reply);
        self.publish_state();
    }

    fn handle_list(&mut self, from: SocketAddr, remote_peers: HashMap<PeerId, PeerInfo>) {
        let now = Instant::now();
        for (_, info) in remote_peers {
            let id = info.id;
            let timeout_ms = info.timeout_ms;
            match self.peers.add_or_merge(info) {
                MergeOutcome::Inserted => {
                    self.timers.arm(id, Duration::from_millis(timeout_ms), now);
                }
                MergeOutcome::Updated { revived } => {
                    self.timers.arm(id, Duration::from_millis(timeout_ms), now);
                    if revived {
                        let _ = self.event_tx.send(Event::PeerRevived { peer: id });
                    }
                }
                MergeOutcome::Ignored => {}
            }
        }
        let _ = self.event_tx.send(Event::List { from, peer_count: self.peers.len() });
    }

    async fn handle_votes(&mut self, from: SocketAddr, topic: String, incoming: crate::domain::Election) {
        let was_closed = self.ballots.get(&topic).map(|e| e.closed).unwrap_or(false);
        self.ballots.merge(&topic, incoming);
        let _ = self.event_tx.send(Event::Votes { from, topic: topic.clone() });

        let closed_by_merge = self.ballots.get(&topic).map(|e| e.closed).unwrap_or(false);
        let closed = if closed_by_merge {
            true
        } else {
            self.ballots.decide(&topic, self.peers.len())
        };

        if !was_closed && closed {
            self.emit_terminal_event(&topic);
        } else if !closed {
            self.forward_votes(&topic).await;
        }
    }

    fn emit_terminal_event(&mut self, topic: &str) {
        let Some(election) = self.ballots.get(topic) else { return };
        let results = protocol::tally_to_strings(election.results.as_ref().unwrap_or(&HashMap::new()));
        if election.expired {
            let _ = self.event_tx.send(Event::Deadline { topic: topic.to_string() });
        } else {
            let _ = self.event_tx.send(Event::Quorum { topic: topic.to_string(), results });
        }
    }

    async fn forward_votes(&mut self, topic: &str) {
        let Some(election) = self.ballots.get(topic).cloned() else { return };
        let Some(target) = self.peers.random_alive_peer().cloned() else { return };
        let envelope = Envelope::votes(topic.to_string(), election);
        self.send(target.socket_addr(), envelope).await;
    }

    // -- Public API commands --

    async fn handle_command(&mut self, command: NodeCommand) {
        match command {
            NodeCommand::Set { key, value, reply } => {
                let version = self.store.set(key, value);
                self.publish_state();
                let _ = reply.send(version);
            }
            NodeCommand::Get { key, reply } => {
                let value = self.store.get(&key).map(|entry| entry.value.clone());
                let _ = reply.send(value);
            }
            NodeCommand::Vote { topic, value, reply } => {
                let was_closed = self.ballots.get(&topic).map(|e| e.closed).unwrap_or(false);
                let voter = self.peers.self_id();
                let vote_lifetime = self.peers.self_info().lifetime;
                let mut outcome = self.ballots.vote(voter, &topic, value, vote_lifetime);

                // `vote` itself only records the ballot; evaluate the quorum
                // predicate immediately after, same as a merge.
                if !was_closed && self.ballots.decide(&topic, self.peers.len()) {
                    outcome.closed = true;
                }

                if !was_closed && outcome.closed {
                    self.emit_terminal_event(&topic);
                } else if !outcome.closed {
                    self.forward_votes(&topic).await;
                }
                let _ = reply.send(outcome);
            }
            NodeCommand::Election { mut opts, reply } => {
                opts.origin = self.peers.self_id();
                self.ballots.election(opts);
                let _ = reply.send(());
            }
            NodeCommand::Join { addr } => {
                let envelope = Envelope::list(self.peers.snapshot());
                self.send(addr, envelope).await;
            }
        }
    }

    // -- Shared send path: lifetime bumps unconditionally on every send --

    async fn send(&mut self, addr: SocketAddr, envelope: Envelope) {
        self.peers.bump_self_lifetime();
        let msg_type = envelope.meta.msg_type;
        let _ = self.event_tx.send(Event::Send { to: addr, msg_type });
        if self.transport_tx.send(TransportCommand::Send(addr, envelope)).await.is_ok() {
            let _ = self.event_tx.send(Event::Sent { to: addr, msg_type });
        }
    }

    fn publish_state(&self) {
        let state = NetworkState {
            self_id: Some(self.peers.self_id()),
            peers: self.peers.snapshot(),
            keys: self.store.keys().cloned().collect(),
        };
        let _ = self.state_tx.send(state);
    }
}

