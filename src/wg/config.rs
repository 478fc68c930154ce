use std::{
    fs,
    net::{SocketAddr, ToSocketAddrs},
    num::ParseIntError,
    path::Path,
    result::Result,
    str::FromStr,
    time::Duration,
};

use crate::error::Error;

use super::{Cidr, Key, KeyParseError};

/// A sparse change request for one device. `None` leaves the live value alone.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Config {
    // PrivateKey
    pub private_key: Option<Key>,

    // ListenPort
    pub listen_port: Option<u16>,

    // FirewallMark / FwMark
    pub firewall_mark: Option<u32>,

    pub peers: Vec<PeerConfig>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    // PublicKey
    pub public_key: Key,

    // PresharedKey
    pub preshared_key: Option<Key>,

    // Endpoint
    pub endpoint: Option<SocketAddr>,

    // AllowedIPs, replaces the peer's list when present
    pub allowed_ips: Option<Vec<Cidr>>,

    // PersistentKeepalive
    pub persistent_keepalive_interval: Option<Duration>,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("line {0}: expected a [Section] header or `Key = Value`")]
    UnexpectedToken(usize),

    #[error("error parsing {field}: {source}")]
    KeyParseError {
        field: &'static str,
        #[source]
        source: KeyParseError,
    },

    #[error("error parsing {field} {value:?}: {source}")]
    ParseIntError {
        field: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("error parsing ip {0:?}: expected address/prefix")]
    Cidr(String),

    #[error("error parsing endpoint {value:?}: {reason}")]
    Endpoint { value: String, reason: String },

    #[error("error parsing persistent keepalive {0:?}: expected seconds or `off`")]
    PersistentKeepalive(String),

    #[error("line {0}: [Peer] section has no PublicKey")]
    MissingPublicKey(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<'a> {
    pub name: &'a str,
    pub line: usize,
    pub entries: Vec<Entry<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<'a> {
    pub key: &'a str,
    pub value: &'a str,
    pub line: usize,
}

/// Splits INI text into sections in file order. `#` and `;` start comments.
pub fn read_sections(input: &str) -> Result<Vec<Section<'_>>, ParseError> {
    let mut sections: Vec<Section<'_>> = Vec::new();

    for (idx, raw) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            sections.push(Section {
                name: name.trim(),
                line: line_no,
                entries: Vec::new(),
            });
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or(ParseError::UnexpectedToken(line_no))?;
        let section = sections
            .last_mut()
            .ok_or(ParseError::UnexpectedToken(line_no))?;

        section.entries.push(Entry {
            key: key.trim(),
            value: value.trim(),
            line: line_no,
        });
    }

    Ok(sections)
}

fn strip_comment(line: &str) -> &str {
    match line.find(['#', ';']) {
        Some(pos) => &line[..pos],
        None => line,
    }
}

enum SectionKind {
    Interface,
    Peer,
    Unknown,
}

impl From<&str> for SectionKind {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "interface" => SectionKind::Interface,
            "peer" => SectionKind::Peer,
            _ => SectionKind::Unknown,
        }
    }
}

enum WgPropKind {
    PrivateKey,
    ListenPort,
    FwMark,
    PublicKey,
    PresharedKey,
    AllowedIPs,
    Endpoint,
    PersistentKeepalive,
    Unknown,
}

impl From<&str> for WgPropKind {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "privatekey" => WgPropKind::PrivateKey,
            "listenport" => WgPropKind::ListenPort,
            "firewallmark" | "fwmark" => WgPropKind::FwMark,
            "publickey" => WgPropKind::PublicKey,
            "presharedkey" => WgPropKind::PresharedKey,
            "allowedips" => WgPropKind::AllowedIPs,
            "endpoint" => WgPropKind::Endpoint,
            "persistentkeepalive" => WgPropKind::PersistentKeepalive,
            _ => WgPropKind::Unknown,
        }
    }
}

struct List<I>(Vec<I>);
impl<I: FromStr> FromStr for List<I> {
    type Err = I::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut items = Vec::new();

        // blank value is an empty list, a blank item is an error
        if s.trim().is_empty() {
            return Ok(List(items));
        }

        for s in s.split(',').map(str::trim) {
            items.push(s.parse()?);
        }

        Ok(List(items))
    }
}

fn parse_key(field: &'static str, value: &str) -> Result<Key, ParseError> {
    value
        .parse()
        .map_err(|source| ParseError::KeyParseError { field, source })
}

pub fn parse_listen_port(value: &str) -> Result<u16, ParseError> {
    value
        .trim()
        .parse()
        .map_err(|source| ParseError::ParseIntError {
            field: "listen port",
            value: value.to_string(),
            source,
        })
}

pub fn parse_fwmark(value: &str) -> Result<u32, ParseError> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("off") {
        return Ok(0);
    }

    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => trimmed.parse(),
    };

    parsed.map_err(|source| ParseError::ParseIntError {
        field: "firewall mark",
        value: value.to_string(),
        source,
    })
}

/// Whole seconds, or `off` for a disabled keepalive.
pub fn parse_keepalive(value: &str) -> Result<Duration, ParseError> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("off") {
        return Ok(Duration::ZERO);
    }

    trimmed
        .parse::<u16>()
        .map(|secs| Duration::from_secs(secs.into()))
        .map_err(|_| ParseError::PersistentKeepalive(value.to_string()))
}

pub fn resolve_endpoint(value: &str) -> Result<SocketAddr, ParseError> {
    let endpoint_error = |reason: String| ParseError::Endpoint {
        value: value.to_string(),
        reason,
    };

    value
        .trim()
        .to_socket_addrs()
        .map_err(|e| endpoint_error(e.to_string()))?
        .next()
        .ok_or_else(|| endpoint_error("no addresses found".to_string()))
}

impl PeerConfig {
    fn parse(section: &Section<'_>) -> Result<Self, ParseError> {
        let mut public_key = None;
        let mut peer = PeerConfig::default();

        for entry in &section.entries {
            match WgPropKind::from(entry.key) {
                WgPropKind::PublicKey => public_key = Some(parse_key("public key", entry.value)?),
                WgPropKind::PresharedKey => {
                    peer.preshared_key = Some(parse_key("preshared key", entry.value)?)
                }
                WgPropKind::AllowedIPs => {
                    peer.allowed_ips = Some(entry.value.parse::<List<Cidr>>()?.0)
                }
                WgPropKind::Endpoint => peer.endpoint = Some(resolve_endpoint(entry.value)?),
                WgPropKind::PersistentKeepalive => {
                    peer.persistent_keepalive_interval = Some(parse_keepalive(entry.value)?)
                }
                _ => log::debug!(
                    "line {}: ignoring {} in [Peer] section",
                    entry.line,
                    entry.key
                ),
            }
        }

        peer.public_key = public_key.ok_or(ParseError::MissingPublicKey(section.line))?;
        Ok(peer)
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let data = fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Config::parse_config(&data)?)
    }

    pub fn parse_config(input: &str) -> Result<Self, ParseError> {
        let mut config = Config::default();

        for section in read_sections(input)? {
            match SectionKind::from(section.name) {
                SectionKind::Interface => config.apply_interface(&section)?,
                SectionKind::Peer => config.peers.push(PeerConfig::parse(&section)?),
                SectionKind::Unknown => log::debug!(
                    "line {}: ignoring section [{}]",
                    section.line,
                    section.name
                ),
            }
        }

        Ok(config)
    }

    fn apply_interface(&mut self, section: &Section<'_>) -> Result<(), ParseError> {
        for entry in &section.entries {
            match WgPropKind::from(entry.key) {
                WgPropKind::PrivateKey => {
                    self.private_key = Some(parse_key("private key", entry.value)?)
                }
                WgPropKind::ListenPort => self.listen_port = Some(parse_listen_port(entry.value)?),
                WgPropKind::FwMark => self.firewall_mark = Some(parse_fwmark(entry.value)?),
                _ => log::debug!(
                    "line {}: ignoring {} in [Interface] section",
                    entry.line,
                    entry.key
                ),
            }
        }

        Ok(())
    }

    pub fn to_wg_conf(&self) -> String {
        let mut lines = vec!["[Interface]".to_string()];

        if let Some(key) = self.private_key {
            lines.push(format!("PrivateKey = {key}"));
        }
        if let Some(port) = self.listen_port {
            lines.push(format!("ListenPort = {port}"));
        }
        if let Some(fwmark) = self.firewall_mark {
            lines.push(format!("FwMark = {fwmark}"));
        }

        for peer in &self.peers {
            lines.push(String::new());
            lines.push("[Peer]".to_string());
            lines.push(format!("PublicKey = {}", peer.public_key));

            if let Some(psk) = peer.preshared_key {
                lines.push(format!("PresharedKey = {psk}"));
            }
            if let Some(ref ips) = peer.allowed_ips {
                let ips: Vec<String> = ips.iter().map(|ip| ip.to_string()).collect();
                lines.push(format!("AllowedIPs = {}", ips.join(", ")));
            }
            if let Some(endpoint) = peer.endpoint {
                lines.push(format!("Endpoint = {endpoint}"));
            }
            if let Some(keepalive) = peer.persistent_keepalive_interval {
                lines.push(format!("PersistentKeepalive = {}", keepalive.as_secs()));
            }
        }

        lines.push(String::new());
        lines.join("\n")
    }
}
