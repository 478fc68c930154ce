use std::{
    fs,
    io::{self, BufRead, BufReader, Write},
    os::unix::net::UnixStream,
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use crate::error::Error;

use super::{
    Cidr, Key, WireguardApi,
    config::Config,
    device::{Device, DeviceType},
    peer::Peer,
};

const SOCKET_EXTENSION: &str = "sock";

#[derive(Debug, Clone)]
pub struct UapiBackend {
    socket_dir: PathBuf,
}

impl UapiBackend {
    pub fn new(socket_dir: impl Into<PathBuf>) -> Self {
        Self {
            socket_dir: socket_dir.into(),
        }
    }

    pub fn socket_dir(&self) -> &Path {
        &self.socket_dir
    }

    pub fn socket_path(&self, name: &str) -> PathBuf {
        self.socket_dir.join(format!("{name}.{SOCKET_EXTENSION}"))
    }

    pub fn has_device(&self, name: &str) -> bool {
        self.socket_path(name).exists()
    }

    pub fn device_names(&self) -> Result<Vec<String>, Error> {
        let entries = match fs::read_dir(&self.socket_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == SOCKET_EXTENSION))
            .filter_map(|path| Some(path.file_stem()?.to_str()?.to_string()))
            .collect();
        names.sort();

        Ok(names)
    }

    fn connect(&self, name: &str) -> Result<UnixStream, Error> {
        let path = self.socket_path(name);
        log::debug!("connecting to {}", path.display());

        UnixStream::connect(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => Error::DeviceNotFound(name.to_string()),
            _ => err.into(),
        })
    }

    pub fn get_device(&self, name: &str) -> Result<Device, Error> {
        let mut stream = self.connect(name)?;
        stream.write_all(b"get=1\n\n")?;

        parse_get_response(name, BufReader::new(stream))
    }
}

impl WireguardApi for UapiBackend {
    type Error = Error;

    fn devices(&self) -> Result<Vec<Device>, Self::Error> {
        self.device_names()?
            .iter()
            .map(|name| self.get_device(name))
            .collect()
    }

    fn configure_device(&mut self, name: &str, config: &Config) -> Result<(), Self::Error> {
        let mut stream = self.connect(name)?;

        let mut request = Vec::new();
        write_set_request(&mut request, config)?;
        stream.write_all(&request)?;

        read_errno(BufReader::new(stream))
    }
}

fn malformed(key: &str, value: &str, err: impl std::fmt::Display) -> Error {
    Error::Malformed(format!("{key}={value}: {err}"))
}

fn parse_num<T>(key: &str, value: &str) -> Result<T, Error>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|err| malformed(key, value, err))
}

fn check_errno(value: &str) -> Result<(), Error> {
    match parse_num::<i32>("errno", value)? {
        0 => Ok(()),
        errno => Err(Error::Errno(errno)),
    }
}

pub(crate) fn parse_get_response(name: &str, reader: impl BufRead) -> Result<Device, Error> {
    let mut device = Device {
        name: name.to_string(),
        device_type: DeviceType::Userspace,
        ..Default::default()
    };
    let mut peer: Option<Peer> = None;

    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            break;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| Error::Malformed(format!("expected key=value, got {line:?}")))?;

        if key == "public_key" {
            let public_key = Key::from_hex(value).map_err(|e| malformed(key, value, e))?;
            device.peers.extend(peer.replace(Peer::new(public_key)));
            continue;
        }

        match (key, peer.as_mut()) {
            ("private_key", _) => {
                device.private_key = Key::from_hex(value).map_err(|e| malformed(key, "..", e))?
            }
            ("listen_port", _) => device.listen_port = parse_num(key, value)?,
            ("fwmark", _) => device.firewall_mark = parse_num(key, value)?,
            ("errno", _) => check_errno(value)?,
            ("preshared_key", Some(peer)) => {
                peer.preshared_key = Key::from_hex(value).map_err(|e| malformed(key, "..", e))?
            }
            ("endpoint", Some(peer)) => peer.endpoint = Some(parse_num(key, value)?),
            ("allowed_ip", Some(peer)) => peer.allowed_ips.push(parse_num::<Cidr>(key, value)?),
            ("protocol_version", Some(peer)) => peer.protocol_version = parse_num(key, value)?,
            ("rx_bytes", Some(peer)) => peer.receive_bytes = parse_num(key, value)?,
            ("tx_bytes", Some(peer)) => peer.transmit_bytes = parse_num(key, value)?,
            ("persistent_keepalive_interval", Some(peer)) => {
                peer.persistent_keepalive_interval =
                    Duration::from_secs(parse_num(key, value)?)
            }
            ("last_handshake_time_sec", Some(peer)) => {
                let secs: u64 = parse_num(key, value)?;
                peer.last_handshake_time =
                    (secs != 0).then(|| UNIX_EPOCH + Duration::from_secs(secs));
            }
            ("last_handshake_time_nsec", Some(peer)) => {
                let nanos: u64 = parse_num(key, value)?;
                peer.last_handshake_time = peer
                    .last_handshake_time
                    .map(|time: SystemTime| time + Duration::from_nanos(nanos));
            }
            (
                "preshared_key" | "endpoint" | "allowed_ip" | "protocol_version" | "rx_bytes"
                | "tx_bytes"
                | "persistent_keepalive_interval" | "last_handshake_time_sec"
                | "last_handshake_time_nsec",
                None,
            ) => return Err(malformed(key, value, "peer attribute before public_key")),
            _ => log::debug!("{name}: ignoring uapi key {key}"),
        }
    }

    device.peers.extend(peer);

    for peer in device.peers.iter().filter(|p| p.protocol_version > 1) {
        log::warn!(
            "{name}: peer {} uses protocol version {}",
            peer.public_key,
            peer.protocol_version
        );
    }

    if !device.private_key.is_zero() {
        device.public_key = device.private_key.public_key();
    }

    Ok(device)
}

pub(crate) fn write_set_request(out: &mut impl Write, config: &Config) -> io::Result<()> {
    writeln!(out, "set=1")?;

    if let Some(key) = config.private_key {
        writeln!(out, "private_key={}", key.to_hex())?;
    }
    if let Some(port) = config.listen_port {
        writeln!(out, "listen_port={port}")?;
    }
    if let Some(fwmark) = config.firewall_mark {
        writeln!(out, "fwmark={fwmark}")?;
    }

    for peer in &config.peers {
        writeln!(out, "public_key={}", peer.public_key.to_hex())?;

        if let Some(psk) = peer.preshared_key {
            writeln!(out, "preshared_key={}", psk.to_hex())?;
        }
        if let Some(endpoint) = peer.endpoint {
            writeln!(out, "endpoint={endpoint}")?;
        }
        if let Some(keepalive) = peer.persistent_keepalive_interval {
            writeln!(out, "persistent_keepalive_interval={}", keepalive.as_secs())?;
        }
        if let Some(ref ips) = peer.allowed_ips {
            writeln!(out, "replace_allowed_ips=true")?;
            for ip in ips {
                writeln!(out, "allowed_ip={ip}")?;
            }
        }
    }

    writeln!(out)
}

pub(crate) fn read_errno(reader: impl BufRead) -> Result<(), Error> {
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            break;
        }

        if let Some(value) = line.strip_prefix("errno=") {
            return check_errno(value);
        }
    }

    Err(Error::Malformed("set response without errno".to_string()))
}
