//! src/transport/mod.rs
//!
//! Defines the `Transport` service: one short, length-framed TCP
//! conversation per message exchange.
//!
//! The protocol only ever produces a same-connection reply for `gossip`
//! (answered with `request`) and `request` (answered with `response`);
//! every other verb yields no reply. That lets both the connecting side and
//! the accepting side share one symmetric loop: write an initial message if
//! there is one, then repeatedly read a frame, hand it to the engine, and
//! write back whatever reply (if any) comes back. Whichever party has
//! nothing further to send drops its stream, which the other side observes
//! as a clean EOF and uses to end its own loop — this is what keeps the
//! connection alive for the full `gossip -> request -> response` exchange
//! without either side needing to know how many hops are left.

use crate::error::Result;
use crate::transport::codec::{read_frame, write_frame, Envelope};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

pub mod codec;

/// Commands the engine sends to the transport to originate outgoing
/// conversations.
#[derive(Debug)]
pub enum TransportCommand {
    Send(SocketAddr, Envelope),
}

/// A single inbound frame, paired with a channel the engine uses to send
/// back this connection's reply (if any).
#[derive(Debug)]
pub struct InboundMessage {
    pub peer_addr: SocketAddr,
    pub envelope: Envelope,
    pub reply_tx: oneshot::Sender<Option<Envelope>>,
}

pub struct Transport {
    listener: TcpListener,
    command_rx: mpsc::Receiver<TransportCommand>,
    inbound_tx: mpsc::Sender<InboundMessage>,
}

impl Transport {
    pub fn bind(
        bind_addr: SocketAddr,
        command_rx: mpsc::Receiver<TransportCommand>,
        inbound_tx: mpsc::Sender<InboundMessage>,
    ) -> Result<Self> {
        let std_listener = std::net::TcpListener::bind(bind_addr)?;
        std_listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(std_listener)?;
        Ok(Self { listener, command_rx, inbound_tx })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(mut self, shutdown_token: CancellationToken) {
        let local_addr = self.listener.local_addr().expect("bound listener has a local addr");
        tracing::info!(listen_addr = %local_addr, "Transport service started");

        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    tracing::info!("Transport service received shutdown signal.");
                    break;
                },
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            let inbound_tx = self.inbound_tx.clone();
                            tokio::spawn(async move {
                                run_conversation(stream, peer_addr, None, inbound_tx).await;
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to accept inbound connection");
                        }
                    }
                },
                Some(command) = self.command_rx.recv() => {
                    self.handle_command(command);
                }
                else => {
                    tracing::info!("Command channel closed. Transport service shutting down.");
                    break;
                }
            }
        }
    }

    fn handle_command(&self, command: TransportCommand) {
        match command {
            TransportCommand::Send(addr, envelope) => {
                let inbound_tx = self.inbound_tx.clone();
                tokio::spawn(async move {
                    match TcpStream::connect(addr).await {
                        Ok(stream) => {
                            run_conversation(stream, addr, Some(envelope), inbound_tx).await;
                        }
                        Err(e) => {
                            // Dead peers may refuse connection; the failure
                            // detector runs independently.
                            tracing::debug!(peer = %addr, error = %e, "Failed to connect to peer");
                        }
                    }
                });
            }
        }
    }
}

async fn run_conversation(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    initial: Option<Envelope>,
    inbound_tx: mpsc::Sender<InboundMessage>,
) {
    if let Some(envelope) = initial {
        if let Err(e) = write_frame(&mut stream, &envelope).await {
            tracing::debug!(peer = %peer_addr, error = %e, "Failed to write initial message");
            return;
        }
    }

    loop {
        let envelope = match read_frame(&mut stream).await {
            Ok(Some(envelope)) => envelope,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(peer = %peer_addr, error = %e, "Failed to read frame, dropping connection");
                break;
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if inbound_tx
            .send(InboundMessage { peer_addr, envelope, reply_tx })
            .await
            .is_err()
        {
            tracing::debug!("Engine inbound channel closed; dropping connection");
            break;
        }

        match reply_rx.await {
            Ok(Some(reply)) => {
                if let Err(e) = write_frame(&mut stream, &reply).await {
                    tracing::debug!(peer = %peer_addr, error = %e, "Failed to write reply");
                    break;
                }
            }
            Ok(None) => break,
            Err(_) => break,
        }
    }
}
