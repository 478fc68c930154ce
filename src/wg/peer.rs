use std::{
    net::SocketAddr,
    time::{Duration, SystemTime},
};

use super::{Cidr, Key};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Peer {
    // PublicKey
    pub public_key: Key,

    // PresharedKey, all zeroes when unset
    pub preshared_key: Key,

    // Endpoint
    pub endpoint: Option<SocketAddr>,

    // AllowedIPs
    pub allowed_ips: Vec<Cidr>,

    // Transfer
    pub receive_bytes: u64,
    pub transmit_bytes: u64,

    // PersistentKeepalive, zero is disabled
    pub persistent_keepalive_interval: Duration,

    // LatestHandshake
    pub last_handshake_time: Option<SystemTime>,

    // userspace only, zero when unknown
    pub protocol_version: u32,
}

impl Peer {
    pub fn new(public_key: Key) -> Self {
        Self {
            public_key,
            ..Default::default()
        }
    }
}
