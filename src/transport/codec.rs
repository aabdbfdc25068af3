//! src/transport/codec.rs
//!
//! The wire envelope and its length-prefixed framing.
//!
//! Each message is a self-describing record with a `meta.type` field and a
//! `data` payload; malformed records (missing `meta`, missing `meta.type`,
//! or missing `data`) are rejected by construction here, since `Envelope`
//! is a single tagged enum rather than a free-form map — there is no
//! "wrong boolean combinator" to get wrong.

use crate::domain::{Election, PeerId, PeerInfo};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// The maximum allowed size for a single framed message.
pub const MAX_MESSAGE_SIZE: u32 = 1_024 * 1_024; // 1 MiB

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub meta: Meta,
    pub data: MessagePayload,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Meta {
    #[serde(rename = "type")]
    pub msg_type: crate::event::MessageType,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MessagePayload {
    List(HashMap<PeerId, PeerInfo>),
    Gossip { key: String, version: u64 },
    Request { key: String, version: u64 },
    Response { key: String, value: Option<Vec<u8>>, version: u64 },
    Votes { topic: String, election: Election },
}

impl Envelope {
    pub fn list(peers: HashMap<PeerId, PeerInfo>) -> Self {
        Self {
            meta: Meta { msg_type: crate::event::MessageType::List },
            data: MessagePayload::List(peers),
        }
    }

    pub fn gossip(key: String, version: u64) -> Self {
        Self {
            meta: Meta { msg_type: crate::event::MessageType::Gossip },
            data: MessagePayload::Gossip { key, version },
        }
    }

    pub fn request(key: String, version: u64) -> Self {
        Self {
            meta: Meta { msg_type: crate::event::MessageType::Request },
            data: MessagePayload::Request { key, version },
        }
    }

    pub fn response(key: String, value: Option<Vec<u8>>, version: u64) -> Self {
        Self {
            meta: Meta { msg_type: crate::event::MessageType::Response },
            data: MessagePayload::Response { key, value, version },
        }
    }

    pub fn votes(topic: String, election: Election) -> Self {
        Self {
            meta: Meta { msg_type: crate::event::MessageType::Votes },
            data: MessagePayload::Votes { topic, election },
        }
    }
}

/// Writes a single length-prefixed, `bincode`-encoded envelope to `writer`.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    envelope: &Envelope,
) -> Result<()> {
    let body = bincode::serialize(envelope)?;
    if body.len() as u64 > MAX_MESSAGE_SIZE as u64 {
        return Err(Error::FrameTooLarge(body.len()));
    }
    writer.write_u32(body.len() as u32).await?;
    writer.write_all(&body).await?;
    Ok(())
}

/// Reads a single length-prefixed, `bincode`-encoded envelope from `reader`.
/// Returns `Ok(None)` on a clean EOF before any bytes of a new frame arrive
/// (the peer closed the connection, ending the conversation).
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Option<Envelope>> {
    let len = match reader.read_u32().await {
        Ok(len) => len,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > MAX_MESSAGE_SIZE {
        return Err(Error::FrameTooLarge(len as usize));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    let envelope = bincode::deserialize(&body)?;
    Ok(Some(envelope))
}
