use std::path::PathBuf;

pub const DEFAULT_SOCKET_DIR: &str = "/var/run/wireguard";
pub const DEFAULT_WG_BINARY: &str = "wg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    // WG_SOCKET_DIR
    pub socket_dir: PathBuf,

    // WG_BINARY
    pub wg_binary: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

impl Settings {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());

        Self {
            socket_dir: non_empty("WG_SOCKET_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| DEFAULT_SOCKET_DIR.into()),
            wg_binary: non_empty("WG_BINARY").unwrap_or_else(|| DEFAULT_WG_BINARY.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_environment() {
        let settings = Settings::from_lookup(|_| None);
        assert_eq!(settings.socket_dir, PathBuf::from("/var/run/wireguard"));
        assert_eq!(settings.wg_binary, "wg");
    }

    #[test]
    fn environment_overrides() {
        let settings = Settings::from_lookup(|name| match name {
            "WG_SOCKET_DIR" => Some("/tmp/wg".into()),
            "WG_BINARY" => Some(String::new()),
            _ => None,
        });
        assert_eq!(settings.socket_dir, PathBuf::from("/tmp/wg"));
        assert_eq!(settings.wg_binary, "wg");
    }
}
