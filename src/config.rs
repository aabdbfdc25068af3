//! src/config.rs
//!
//! The strongly-typed `Config` struct for all runtime parameters, loaded
//! from a config file and environment variables via `figment`.

use crate::domain::{PeerId, PeerInfo};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// The address this node binds its listener to and advertises to
    /// peers. Split into separate bind/advertise addresses is unnecessary
    /// for this protocol's scope.
    pub address: IpAddr,
    pub port: u16,
    /// Seed peers known at startup, merged into the peer table before
    /// listening begins.
    pub peers: Option<HashMap<PeerId, PeerInfo>>,
    pub timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub list_interval_ms: u64,
    pub hash_interval_ms: u64,
    pub api: Option<ApiConfig>,
}

/// Configuration for the optional read-only HTTP/WebSocket state mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
}

impl Config {
    /// Loads configuration from `config.toml` and `GOSSIP_`-prefixed
    /// environment variables, layered over the defaults.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("GOSSIP_"))
            .extract()
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 8992,
            peers: None,
            timeout_ms: 10_000,
            heartbeat_interval_ms: 100,
            list_interval_ms: 300,
            hash_interval_ms: 300,
            api: None,
        }
    }
}
