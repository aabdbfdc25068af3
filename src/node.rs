//! src/node.rs
//!
//! The public API surface: `set`/`get`/`vote`/`election`/`join`/`listen`/
//! `close`, plus an observable event stream.

use crate::config::Config;
use crate::domain::{ElectionOptions, NetworkState, PeerId, PeerInfo, VoteOutcome};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::transport::{InboundMessage, Transport, TransportCommand};
use std::net::SocketAddr;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

/// Commands the public API sends to the engine. Each carries a `oneshot`
/// reply channel except `Join`, which is fire-and-forget (its effect is
/// observed through the peer table converging, not a direct reply).
#[derive(Debug)]
pub enum NodeCommand {
    Set { key: String, value: Vec<u8>, reply: oneshot::Sender<u64> },
    Get { key: String, reply: oneshot::Sender<Option<Vec<u8>>> },
    Vote { topic: String, value: Vec<u8>, reply: oneshot::Sender<VoteOutcome> },
    Election { opts: ElectionOptions, reply: oneshot::Sender<()> },
    Join { addr: SocketAddr },
}

/// A running node: owns the engine, transport, and (optional) API server
/// tasks, and exposes the protocol's operations as async methods.
pub struct Node {
    command_tx: mpsc::Sender<NodeCommand>,
    event_tx: broadcast::Sender<Event>,
    state_rx: watch::Receiver<NetworkState>,
    shutdown_token: CancellationToken,
    transport_task: tokio::task::JoinHandle<()>,
    engine_task: tokio::task::JoinHandle<()>,
    api_task: Option<tokio::task::JoinHandle<Result<()>>>,
}

impl Node {
    /// Binds the listening socket, starts the engine's periodic emitters,
    /// and (if configured) the read-only API mirror.
    pub async fn listen(config: Config) -> Result<Self> {
        let self_info = PeerInfo {
            id: PeerId::new(),
            address: config.address,
            port: config.port,
            alive: true,
            lifetime: 0,
            timeout_ms: config.timeout_ms,
            heartbeat_interval_ms: config.heartbeat_interval_ms,
            list_interval_ms: config.list_interval_ms,
            hash_interval_ms: config.hash_interval_ms,
        };

        let (transport_command_tx, transport_command_rx) = mpsc::channel::<TransportCommand>(256);
        let (inbound_tx, inbound_rx) = mpsc::channel::<InboundMessage>(256);
        let (command_tx, command_rx) = mpsc::channel::<NodeCommand>(64);
        let (event_tx, _) = broadcast::channel::<Event>(1024);
        let (state_tx, state_rx) = watch::channel(NetworkState::default());

        let bind_addr = config.bind_addr();
        let transport = Transport::bind(bind_addr, transport_command_rx, inbound_tx)?;
        let shutdown_token = CancellationToken::new();

        let transport_task = tokio::spawn(transport.run(shutdown_token.clone()));

        let engine = Engine::new(
            self_info,
            config.peers.clone().unwrap_or_default(),
            inbound_rx,
            command_rx,
            transport_command_tx,
            event_tx.clone(),
            state_tx,
        );
        let engine_task = tokio::spawn(engine.run(shutdown_token.clone()));

        let api_task = if let Some(api_config) = config.api {
            let api_server = crate::api::ApiServer::new(api_config.bind_addr, state_rx.clone(), event_tx.clone());
            Some(tokio::spawn(api_server.run(shutdown_token.clone())))
        } else {
            None
        };

        Ok(Self {
            command_tx,
            event_tx,
            state_rx,
            shutdown_token,
            transport_task,
            engine_task,
            api_task,
        })
    }

    /// Bumps the store's version and overwrites `key`.
    pub async fn set(&self, key: impl Into<String>, value: Vec<u8>) -> Result<u64> {
        let (reply, rx) = oneshot::channel();
        self.send_command(NodeCommand::Set { key: key.into(), value, reply }).await?;
        rx.await.map_err(|_| Error::EngineGone)
    }

    pub async fn get(&self, key: impl Into<String>) -> Result<Option<Vec<u8>>> {
        let (reply, rx) = oneshot::channel();
        self.send_command(NodeCommand::Get { key: key.into(), reply }).await?;
        rx.await.map_err(|_| Error::EngineGone)
    }

    /// Casts a ballot in an already-registered election.
    pub async fn vote(&self, topic: impl Into<String>, value: Vec<u8>) -> Result<VoteOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send_command(NodeCommand::Vote { topic: topic.into(), value, reply }).await?;
        rx.await.map_err(|_| Error::EngineGone)
    }

    /// Registers a new election; stamping `origin` with this node's id is
    /// the engine's responsibility, not the caller's.
    pub async fn election(&self, opts: ElectionOptions) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send_command(NodeCommand::Election { opts, reply }).await?;
        rx.await.map_err(|_| Error::EngineGone)
    }

    /// Seeds a connection to an existing member.
    pub async fn join(&self, addr: SocketAddr) -> Result<()> {
        self.send_command(NodeCommand::Join { addr }).await
    }

    /// Subscribes to the protocol's typed event stream.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// A live view of this node's peers and store keys, for diagnostics and
    /// the optional API mirror.
    pub fn state(&self) -> watch::Receiver<NetworkState> {
        self.state_rx.clone()
    }

    /// Stops periodic emitters, cancels all peer timers, and stops
    /// listening.
    pub async fn close(self) -> Result<()> {
        self.shutdown_token.cancel();
        self.engine_task.await.map_err(Error::TaskJoin)?;
        self.transport_task.await.map_err(Error::TaskJoin)?;
        if let Some(task) = self.api_task {
            task.await.map_err(Error::TaskJoin)??;
        }
        Ok(())
    }

    async fn send_command(&self, command: NodeCommand) -> Result<()> {
        self.command_tx.send(command).await.map_err(|_| Error::EngineGone)
    }
}
