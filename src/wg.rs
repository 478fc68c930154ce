use base64::prelude::*;
use config::{Config, ParseError};
use device::Device;
use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    str::FromStr,
};
use x25519_dalek::{PublicKey, StaticSecret};

pub mod client;
pub mod cmd;
pub mod config;
pub mod device;
pub mod peer;
pub mod uapi;

pub const KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum KeyParseError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("expected 32 bytes, got {0}")]
    Length(usize),
}

/// A Curve25519 key or preshared key. The all-zero key means "unset".
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key([u8; KEY_LEN]);

impl TryFrom<&[u8]> for Key {
    type Error = KeyParseError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let inner: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| KeyParseError::Length(bytes.len()))?;
        Ok(Key(inner))
    }
}

impl FromStr for Key {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = BASE64_STANDARD.decode(s.trim())?;
        Key::try_from(bytes.as_slice())
    }
}

impl Key {
    pub fn from_hex(s: &str) -> Result<Key, KeyParseError> {
        let bytes = hex::decode(s.trim())?;
        Key::try_from(bytes.as_slice())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; KEY_LEN]
    }

    pub fn public_key(&self) -> Key {
        let secret = StaticSecret::from(self.0);
        Key(*PublicKey::from(&secret).as_bytes())
    }

    #[cfg(test)]
    pub fn random() -> Key {
        Key(rand::random())
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", BASE64_STANDARD.encode(self.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr {
    pub ip: IpAddr,
    pub mask: u8,
}

impl Default for Cidr {
    fn default() -> Self {
        Self {
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            mask: 0,
        }
    }
}

impl Cidr {
    pub fn new(ip: IpAddr, mask: u8) -> Option<Cidr> {
        let ip = match ip {
            IpAddr::V4(v4) if mask <= 32 => {
                let bits = u32::from(v4) & u32::MAX.checked_shl(32 - mask as u32).unwrap_or(0);
                IpAddr::V4(Ipv4Addr::from(bits))
            }
            IpAddr::V6(v6) if mask <= 128 => {
                let bits = u128::from(v6) & u128::MAX.checked_shl(128 - mask as u32).unwrap_or(0);
                IpAddr::V6(Ipv6Addr::from(bits))
            }
            _ => return None,
        };

        Some(Cidr { ip, mask })
    }
}

impl FromStr for Cidr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::Cidr(s.to_string());

        let (ip, mask) = s.trim().split_once('/').ok_or_else(invalid)?;
        let ip: IpAddr = ip.trim().parse().map_err(|_| invalid())?;
        let mask: u8 = mask.trim().parse().map_err(|_| invalid())?;

        Cidr::new(ip, mask).ok_or_else(invalid)
    }
}

impl std::fmt::Display for Cidr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.ip, self.mask)
    }
}

pub trait WireguardApi {
    type Error;

    fn devices(&self) -> Result<Vec<Device>, Self::Error>;
    fn configure_device(&mut self, name: &str, config: &Config) -> Result<(), Self::Error>;
}

#[cfg(test)]
pub mod fake {
    use super::{Config, Device, WireguardApi};
    use crate::error::Error;

    /// In-memory device directory that records every configure call.
    #[derive(Debug, Default)]
    pub struct FakeWireguard {
        pub devices: Vec<Device>,
        pub configured: Vec<(String, Config)>,
    }

    impl FakeWireguard {
        pub fn with_devices(devices: Vec<Device>) -> Self {
            Self {
                devices,
                configured: Vec::new(),
            }
        }
    }

    impl WireguardApi for FakeWireguard {
        type Error = Error;

        fn devices(&self) -> Result<Vec<Device>, Self::Error> {
            Ok(self.devices.clone())
        }

        fn configure_device(&mut self, name: &str, config: &Config) -> Result<(), Self::Error> {
            if !self.devices.iter().any(|d| d.name == name) {
                return Err(Error::DeviceNotFound(name.to_string()));
            }
            self.configured.push((name.to_string(), config.clone()));
            Ok(())
        }
    }
}
