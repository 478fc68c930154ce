use super::{Key, peer::Peer};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    #[default]
    LinuxKernel,
    Userspace,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::LinuxKernel => write!(f, "Linux kernel"),
            DeviceType::Userspace => write!(f, "userspace"),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Device {
    // Interface name
    pub name: String,

    pub device_type: DeviceType,

    // PrivateKey
    pub private_key: Key,

    // PublicKey, derived from the private key
    pub public_key: Key,

    // ListenPort
    pub listen_port: u16,

    // FwMark, 0 is off
    pub firewall_mark: u32,

    pub peers: Vec<Peer>,
}

pub fn find<'a>(devices: &'a [Device], name: &str) -> Option<&'a Device> {
    devices.iter().find(|device| device.name == name)
}
