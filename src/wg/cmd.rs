use std::{
    io::{self, Write},
    process::{Command, Stdio},
    str::FromStr,
    time::{Duration, UNIX_EPOCH},
};

use crate::error::Error;

use super::{
    Cidr, Key, WireguardApi,
    config::{Config, PeerConfig, parse_fwmark},
    device::{Device, DeviceType},
    peer::Peer,
};

const NONE: &str = "(none)";
const OFF: &str = "off";
const STDIN: &str = "/dev/stdin";

pub struct WgCmdBackend {
    program: String,
}

impl WgCmdBackend {
    pub(crate) fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> Command {
        Command::new(&self.program)
    }

    fn run(&self, name: &str, args: &[String], input: &str) -> Result<(), Error> {
        log::debug!("{} {}", self.program, args.join(" "));

        let mut child = self
            .command()
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => Error::DeviceNotFound(name.to_string()),
                _ => err.into(),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(input.as_bytes()) {
                // wg exited early, its status says why
                Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {}
                res => res?,
            }
        }

        let out = child.wait_with_output()?;
        if !out.status.success() {
            log::error!(
                "wg {} {name}: {}",
                args[0],
                String::from_utf8_lossy(&out.stderr).trim()
            );
            return Err(Error::WgCommandFail(out.status.code()));
        }

        Ok(())
    }
}

impl WireguardApi for WgCmdBackend {
    type Error = Error;

    fn devices(&self) -> Result<Vec<Device>, Self::Error> {
        let out = match self.command().args(["show", "all", "dump"]).output() {
            Ok(out) => out,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("{} not found, no kernel devices", self.program);
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        if !out.status.success() {
            log::debug!("wg show: {}", String::from_utf8_lossy(&out.stderr).trim());
            return Err(Error::WgCommandFail(out.status.code()));
        }

        parse_dump(&String::from_utf8_lossy(&out.stdout))
    }

    fn configure_device(&mut self, name: &str, config: &Config) -> Result<(), Self::Error> {
        // every `[Peer]` given to addconf replaces that peer's allowed IPs,
        // so peers without a new list are updated with `wg set` instead
        let (replacing, updating): (Vec<&PeerConfig>, Vec<&PeerConfig>) = config
            .peers
            .iter()
            .partition(|peer| peer.allowed_ips.is_some());

        let addconf = Config {
            private_key: config.private_key,
            listen_port: config.listen_port,
            firewall_mark: config.firewall_mark,
            peers: replacing.into_iter().cloned().collect(),
        };
        let args = ["addconf", name, STDIN].map(String::from);
        self.run(name, &args, &addconf.to_wg_conf())?;

        for peer in updating {
            let (args, input) = set_peer_args(name, peer);
            self.run(name, &args, &input)?;
        }

        Ok(())
    }
}

// no `allowed-ips`, the peer keeps its list
fn set_peer_args(name: &str, peer: &PeerConfig) -> (Vec<String>, String) {
    let mut args: Vec<String> = ["set", name, "peer"].map(String::from).into();
    args.push(peer.public_key.to_string());

    let mut input = String::new();
    if let Some(psk) = peer.preshared_key {
        args.extend(["preshared-key", STDIN].map(String::from));
        input = format!("{psk}\n");
    }
    if let Some(endpoint) = peer.endpoint {
        args.extend(["endpoint".to_string(), endpoint.to_string()]);
    }
    if let Some(keepalive) = peer.persistent_keepalive_interval {
        args.extend([
            "persistent-keepalive".to_string(),
            keepalive.as_secs().to_string(),
        ]);
    }

    (args, input)
}

fn parse<M>(what: &str, value: &str) -> Result<M, Error>
where
    M: FromStr,
    M::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|err| Error::Malformed(format!("{what} {value:?}: {err}")))
}

fn parse_key(what: &str, value: &str) -> Result<Key, Error> {
    if value == NONE {
        return Ok(Key::default());
    }
    Key::from_str(value).map_err(|err| Error::Malformed(format!("{what}: {err}")))
}

/// Parses `wg show all dump`: a 5-field line per interface followed by a
/// 9-field line per peer, tab separated.
pub(crate) fn parse_dump(table: &str) -> Result<Vec<Device>, Error> {
    let mut devices: Vec<Device> = Vec::new();

    for line in table.lines().filter(|l| !l.trim().is_empty()) {
        let fields: Vec<&str> = line.split('\t').collect();

        match fields.len() {
            5 => {
                devices.push(Device {
                    name: fields[0].to_string(),
                    device_type: DeviceType::LinuxKernel,
                    private_key: parse_key("private key", fields[1])?,
                    public_key: parse_key("public key", fields[2])?,
                    listen_port: parse("listen port", fields[3])?,
                    firewall_mark: parse_fwmark(fields[4])
                        .map_err(|err| Error::Malformed(err.to_string()))?,
                    peers: Vec::new(),
                });
            }
            9 => {
                let device = devices
                    .last_mut()
                    .filter(|d| d.name == fields[0])
                    .ok_or_else(|| Error::Malformed(format!("peer before interface {line:?}")))?;

                let mut peer = Peer::new(parse_key("peer public key", fields[1])?);
                peer.preshared_key = parse_key("preshared key", fields[2])?;
                peer.endpoint = match fields[3] {
                    NONE => None,
                    endpoint => Some(parse("endpoint", endpoint)?),
                };
                peer.allowed_ips = match fields[4] {
                    NONE => Vec::new(),
                    ips => ips
                        .split(',')
                        .map(|ip| parse::<Cidr>("allowed ip", ip))
                        .collect::<Result<Vec<_>, _>>()?,
                };
                let handshake: u64 = parse("latest handshake", fields[5])?;
                peer.last_handshake_time =
                    (handshake != 0).then(|| UNIX_EPOCH + Duration::from_secs(handshake));
                peer.receive_bytes = parse("transfer rx", fields[6])?;
                peer.transmit_bytes = parse("transfer tx", fields[7])?;
                peer.persistent_keepalive_interval = match fields[8] {
                    OFF => Duration::ZERO,
                    secs => Duration::from_secs(parse("persistent keepalive", secs)?),
                };

                device.peers.push(peer);
            }
            _ => return Err(Error::Malformed(format!("unexpected dump line {line:?}"))),
        }
    }

    Ok(devices)
}
