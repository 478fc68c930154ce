use std::{
    io::{self, Write},
    time::{Duration, SystemTime},
};

use crate::wg::{Cidr, device::Device, peer::Peer};

const HIDDEN: &str = "(hidden)";
const NONE: &str = "(none)";
const OFF: &str = "off";

pub fn whole_seconds(interval: Duration) -> u64 {
    ((interval.as_millis() + 500) / 1000) as u64
}

fn ips_string(ips: &[Cidr], sep: &str) -> String {
    let ss: Vec<String> = ips.iter().map(|ip| ip.to_string()).collect();
    ss.join(sep)
}

fn fwmark_string(fwmark: u32) -> String {
    if fwmark == 0 {
        OFF.to_string()
    } else {
        format!("0x{fwmark:x}")
    }
}

fn endpoint_string(peer: &Peer) -> String {
    peer.endpoint
        .map(|e| e.to_string())
        .unwrap_or_else(|| NONE.to_string())
}

pub fn device(out: &mut impl Write, device: &Device) -> io::Result<()> {
    writeln!(out, "interface: {} ({})", device.name, device.device_type)?;
    writeln!(out, "  public key: {}", device.public_key)?;
    writeln!(out, "  private key: {HIDDEN}")?;
    writeln!(out, "  listening port: {}", device.listen_port)?;
    if device.firewall_mark != 0 {
        writeln!(out, "  fwmark: {}", fwmark_string(device.firewall_mark))?;
    }

    for p in &device.peers {
        writeln!(out)?;
        peer(out, p)?;
    }

    writeln!(out)
}

fn peer(out: &mut impl Write, peer: &Peer) -> io::Result<()> {
    writeln!(out, "peer: {}", peer.public_key)?;
    if !peer.preshared_key.is_zero() {
        writeln!(out, "  preshared key: {HIDDEN}")?;
    }
    writeln!(out, "  endpoint: {}", endpoint_string(peer))?;

    if peer.allowed_ips.is_empty() {
        writeln!(out, "  allowed ips: {NONE}")?;
    } else {
        writeln!(out, "  allowed ips: {}", ips_string(&peer.allowed_ips, ", "))?;
    }

    if let Some(time) = peer.last_handshake_time {
        let ago = SystemTime::now()
            .duration_since(time)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        writeln!(out, "  latest handshake: {ago} seconds ago")?;
    }

    writeln!(
        out,
        "  transfer: {} B received, {} B sent",
        peer.receive_bytes, peer.transmit_bytes
    )?;

    match whole_seconds(peer.persistent_keepalive_interval) {
        0 => writeln!(out, "  persistent keepalive: {OFF}"),
        secs => writeln!(out, "  persistent keepalive: every {secs} seconds"),
    }
}

pub fn all(out: &mut impl Write, devices: &[Device]) -> io::Result<()> {
    for d in devices {
        device(out, d)?;
    }
    Ok(())
}

pub fn interfaces(out: &mut impl Write, devices: &[Device]) -> io::Result<()> {
    let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
    writeln!(out, "{}", names.join(" "))
}

// a missing device renders as a lone blank line
pub fn conf(out: &mut impl Write, device: Option<&Device>) -> io::Result<()> {
    if let Some(device) = device {
        writeln!(out, "[Interface]")?;
        if device.listen_port != 0 {
            writeln!(out, "ListenPort = {}", device.listen_port)?;
        }
        if device.firewall_mark != 0 {
            writeln!(out, "FwMark = 0x{:x}", device.firewall_mark)?;
        }
        writeln!(out, "PrivateKey = {}", device.private_key)?;

        for peer in &device.peers {
            writeln!(out)?;
            writeln!(out, "[Peer]")?;
            writeln!(out, "PublicKey = {}", peer.public_key)?;
            if !peer.preshared_key.is_zero() {
                writeln!(out, "PresharedKey = {}", peer.preshared_key)?;
            }
            if !peer.allowed_ips.is_empty() {
                writeln!(out, "AllowedIPS = {}", ips_string(&peer.allowed_ips, ", "))?;
            }
            if let Some(endpoint) = peer.endpoint {
                writeln!(out, "Endpoint = {endpoint}")?;
            }
            let keepalive = whole_seconds(peer.persistent_keepalive_interval);
            if keepalive != 0 {
                writeln!(out, "PersistentKeepalive = {keepalive}")?;
            }
        }
    }

    writeln!(out)
}

fn peer_rows(
    out: &mut impl Write,
    device: Option<&Device>,
    row: impl Fn(&Peer) -> String,
) -> io::Result<()> {
    let rows: Vec<String> = device
        .map(|d| d.peers.iter().map(&row).collect())
        .unwrap_or_default();
    writeln!(out, "{}", rows.join("\n"))
}

pub fn endpoints(out: &mut impl Write, device: Option<&Device>) -> io::Result<()> {
    peer_rows(out, device, |p| {
        format!("{}\t{}", p.public_key, endpoint_string(p))
    })
}

pub fn allowed_ips(out: &mut impl Write, device: Option<&Device>) -> io::Result<()> {
    peer_rows(out, device, |p| {
        let ips = if p.allowed_ips.is_empty() {
            NONE.to_string()
        } else {
            ips_string(&p.allowed_ips, " ")
        };
        format!("{}\t{}", p.public_key, ips)
    })
}

pub fn transfer(out: &mut impl Write, device: Option<&Device>) -> io::Result<()> {
    peer_rows(out, device, |p| {
        format!("{}\t{}\t{}", p.public_key, p.receive_bytes, p.transmit_bytes)
    })
}

pub fn fwmark(out: &mut impl Write, device: Option<&Device>) -> io::Result<()> {
    let line = device
        .map(|d| fwmark_string(d.firewall_mark))
        .unwrap_or_default();
    writeln!(out, "{line}")
}

pub fn public_key(out: &mut impl Write, device: Option<&Device>) -> io::Result<()> {
    let line = device
        .map(|d| d.public_key.to_string())
        .unwrap_or_default();
    writeln!(out, "{line}")
}

pub fn listen_port(out: &mut impl Write, device: Option<&Device>) -> io::Result<()> {
    let line = device
        .map(|d| d.listen_port.to_string())
        .unwrap_or_default();
    writeln!(out, "{line}")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::wg::{
        Key,
        config::Config,
        device::{Device, DeviceType},
        peer::Peer,
    };

    use super::*;

    fn render(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn sample_device(name: &str) -> Device {
        let private_key = Key::random();

        let mut first = Peer::new(Key::random());
        first.endpoint = Some("203.0.113.1:51820".parse().unwrap());
        first.allowed_ips = vec!["10.0.0.2/32".parse().unwrap(), "10.1.0.0/16".parse().unwrap()];
        first.receive_bytes = 1024;
        first.transmit_bytes = 2048;
        first.persistent_keepalive_interval = Duration::from_secs(25);

        let mut second = Peer::new(Key::random());
        second.preshared_key = Key::random();
        second.allowed_ips = vec!["fd00::/64".parse().unwrap()];

        Device {
            name: name.to_string(),
            device_type: DeviceType::LinuxKernel,
            private_key,
            public_key: private_key.public_key(),
            listen_port: 51820,
            firewall_mark: 0,
            peers: vec![first, second],
        }
    }

    #[test]
    fn test_device_report() {
        let device = sample_device("wg0");
        let text = render(|out| super::device(out, &device));

        let expected = format!(
            "interface: wg0 (Linux kernel)
  public key: {}
  private key: (hidden)
  listening port: 51820

peer: {}
  endpoint: 203.0.113.1:51820
  allowed ips: 10.0.0.2/32, 10.1.0.0/16
  transfer: 1024 B received, 2048 B sent
  persistent keepalive: every 25 seconds

peer: {}
  preshared key: (hidden)
  endpoint: (none)
  allowed ips: fd00::/64
  transfer: 0 B received, 0 B sent
  persistent keepalive: off

",
            device.public_key, device.peers[0].public_key, device.peers[1].public_key
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_all_never_prints_private_keys() {
        let devices = vec![sample_device("wg0"), sample_device("wg1")];
        let text = render(|out| all(out, &devices));

        assert_eq!(text.matches("interface: ").count(), 2);
        assert!(text.find("interface: wg0").unwrap() < text.find("interface: wg1").unwrap());
        for device in &devices {
            assert!(!text.contains(&device.private_key.to_string()));
            assert!(!text.contains(&device.peers[1].preshared_key.to_string()));
        }
    }

    #[test]
    fn test_interfaces() {
        let devices = vec![sample_device("wg0"), sample_device("utun3")];
        assert_eq!(render(|out| interfaces(out, &devices)), "wg0 utun3\n");
        assert_eq!(render(|out| interfaces(out, &[])), "\n");
    }

    #[test]
    fn test_conf() {
        let mut device = sample_device("wg0");
        device.firewall_mark = 0xca6c;
        let text = render(|out| conf(out, Some(&device)));

        let expected = format!(
            "[Interface]
ListenPort = 51820
FwMark = 0xca6c
PrivateKey = {}

[Peer]
PublicKey = {}
AllowedIPS = 10.0.0.2/32, 10.1.0.0/16
Endpoint = 203.0.113.1:51820
PersistentKeepalive = 25

[Peer]
PublicKey = {}
PresharedKey = {}
AllowedIPS = fd00::/64

",
            device.private_key,
            device.peers[0].public_key,
            device.peers[1].public_key,
            device.peers[1].preshared_key,
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_conf_omits_zero_fields() {
        let mut device = sample_device("wg0");
        device.listen_port = 0;
        device.peers.truncate(1);
        device.peers[0].persistent_keepalive_interval = Duration::ZERO;

        let text = render(|out| conf(out, Some(&device)));
        assert!(!text.contains("ListenPort"));
        assert!(!text.contains("FwMark"));
        assert!(!text.contains("PresharedKey"));
        assert!(!text.contains("PersistentKeepalive"));
        assert!(text.contains("PrivateKey = "));
    }

    #[test]
    fn test_keepalive_is_rounded() {
        let mut device = sample_device("wg0");
        device.peers[0].persistent_keepalive_interval = Duration::from_millis(25_600);
        device.peers[1].persistent_keepalive_interval = Duration::from_millis(14_200);

        let text = render(|out| conf(out, Some(&device)));
        assert!(text.contains("PersistentKeepalive = 26\n"));
        assert!(text.contains("PersistentKeepalive = 14\n"));
        assert_eq!(whole_seconds(Duration::from_millis(400)), 0);
    }

    #[test]
    fn test_conf_round_trips_through_setconf_reader() {
        let mut device = sample_device("wg0");
        device.peers.truncate(1);

        let text = render(|out| conf(out, Some(&device)));
        let config = Config::parse_config(&text).unwrap();

        let peer = &device.peers[0];
        assert_eq!(config.private_key, Some(device.private_key));
        assert_eq!(config.listen_port, Some(51820));
        assert_eq!(config.peers.len(), 1);
        assert_eq!(config.peers[0].public_key, peer.public_key);
        assert_eq!(config.peers[0].allowed_ips.as_ref(), Some(&peer.allowed_ips));
        assert_eq!(config.peers[0].endpoint, peer.endpoint);
        assert_eq!(
            config.peers[0].persistent_keepalive_interval,
            Some(peer.persistent_keepalive_interval)
        );
    }

    #[test]
    fn test_narrowed_reports() {
        let device = sample_device("wg0");
        let (a, b) = (device.peers[0].public_key, device.peers[1].public_key);

        assert_eq!(
            render(|out| endpoints(out, Some(&device))),
            format!("{a}\t203.0.113.1:51820\n{b}\t(none)\n")
        );
        assert_eq!(
            render(|out| allowed_ips(out, Some(&device))),
            format!("{a}\t10.0.0.2/32 10.1.0.0/16\n{b}\tfd00::/64\n")
        );
        assert_eq!(
            render(|out| transfer(out, Some(&device))),
            format!("{a}\t1024\t2048\n{b}\t0\t0\n")
        );
        assert_eq!(render(|out| fwmark(out, Some(&device))), "off\n");
        assert_eq!(render(|out| listen_port(out, Some(&device))), "51820\n");
        assert_eq!(
            render(|out| public_key(out, Some(&device))),
            format!("{}\n", device.public_key)
        );

        let mut marked = device.clone();
        marked.firewall_mark = 42;
        assert_eq!(render(|out| fwmark(out, Some(&marked))), "0x2a\n");
    }

    #[test]
    fn test_missing_device_renders_blank_line() {
        assert_eq!(render(|out| conf(out, None)), "\n");
        assert_eq!(render(|out| endpoints(out, None)), "\n");
        assert_eq!(render(|out| allowed_ips(out, None)), "\n");
        assert_eq!(render(|out| transfer(out, None)), "\n");
        assert_eq!(render(|out| fwmark(out, None)), "\n");
    }
}
