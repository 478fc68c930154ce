use std::{fs, io};

use crate::{error::Error, settings::Settings};

use super::{WireguardApi, cmd::WgCmdBackend, config::Config, device::Device, uapi::UapiBackend};

pub struct Client {
    userspace: UapiBackend,
    kernel: WgCmdBackend,
}

impl Client {
    pub fn open(settings: &Settings) -> Result<Self, Error> {
        match fs::metadata(&settings.socket_dir) {
            Ok(meta) if !meta.is_dir() => {
                return Err(Error::Open(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} is not a directory", settings.socket_dir.display()),
                )));
            }
            Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(Error::Open(err)),
            _ => {}
        }

        log::debug!(
            "using socket dir {} and {}",
            settings.socket_dir.display(),
            settings.wg_binary
        );

        Ok(Self {
            userspace: UapiBackend::new(&settings.socket_dir),
            kernel: WgCmdBackend::new(&settings.wg_binary),
        })
    }
}

impl WireguardApi for Client {
    type Error = Error;

    fn devices(&self) -> Result<Vec<Device>, Self::Error> {
        let mut devices = self.userspace.devices()?;

        // `wg` lists userspace devices too
        devices.extend(
            self.kernel
                .devices()?
                .into_iter()
                .filter(|device| !self.userspace.has_device(&device.name)),
        );

        Ok(devices)
    }

    fn configure_device(&mut self, name: &str, config: &Config) -> Result<(), Self::Error> {
        if self.userspace.has_device(name) {
            log::debug!("configuring {name} over {}", self.userspace.socket_dir().display());
            self.userspace.configure_device(name, config)
        } else {
            log::debug!("configuring {name} with wg");
            self.kernel.configure_device(name, config)
        }
    }
}
