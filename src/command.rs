use std::{io::Write, path::PathBuf};

use clap::{Args, Subcommand, ValueEnum};

use crate::{
    error::Error,
    report,
    wg::{
        WireguardApi,
        config::{Config, ParseError, parse_fwmark, parse_listen_port},
        device::{self, Device},
    },
};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show WireGuard interfaces and peers
    Show(ShowArgs),

    /// Print an interface's configuration as an INI document
    Showconf {
        /// Interface name
        interface: String,
    },

    /// Apply an INI configuration file to an interface
    Setconf {
        /// Interface name
        interface: String,

        /// Configuration file
        file: PathBuf,
    },

    /// Set a single interface option
    Set {
        /// Interface name
        interface: String,

        #[arg(value_enum)]
        key: SetKey,

        value: String,
    },
}

#[derive(Debug, Default, Args)]
pub struct ShowArgs {
    /// Interface name, `all` (default) or `interfaces`
    pub interface: Option<String>,

    /// Print only this field for the interface
    #[arg(value_enum)]
    pub field: Option<ShowField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShowField {
    /// Peer endpoints
    Endpoints,
    /// Peer allowed IPs
    AllowedIps,
    /// Firewall mark
    Fwmark,
    /// Received and sent bytes per peer
    Transfer,
    /// Interface public key
    PublicKey,
    /// Listening port
    ListenPort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SetKey {
    Fwmark,
    ListenPort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowTarget<'a> {
    All,
    Interfaces,
    Device(&'a str),
}

impl<'a> ShowTarget<'a> {
    pub fn resolve(interface: Option<&'a str>) -> Self {
        match interface {
            None | Some("") | Some("all") => ShowTarget::All,
            Some("interfaces") => ShowTarget::Interfaces,
            Some(name) => ShowTarget::Device(name),
        }
    }
}

pub fn run<W>(api: &mut W, command: Option<Command>, out: &mut impl Write) -> Result<(), Error>
where
    W: WireguardApi<Error = Error>,
{
    match command {
        None => show(api, ShowArgs::default(), out),
        Some(Command::Show(args)) => show(api, args, out),
        Some(Command::Showconf { interface }) => {
            let devices = list_devices(api)?;
            report::conf(out, lookup(&devices, &interface))?;
            Ok(())
        }
        Some(Command::Setconf { interface, file }) => {
            let config = Config::from_file(&file)?;
            log::info!(
                "applying {} to {interface} ({} peers)",
                file.display(),
                config.peers.len()
            );
            configure(api, &interface, &config)
        }
        Some(Command::Set {
            interface,
            key,
            value,
        }) => {
            let config = set_config(key, &value)?;
            configure(api, &interface, &config)
        }
    }
}

fn list_devices<W>(api: &W) -> Result<Vec<Device>, Error>
where
    W: WireguardApi<Error = Error>,
{
    api.devices().map_err(Error::list)
}

fn configure<W>(api: &mut W, interface: &str, config: &Config) -> Result<(), Error>
where
    W: WireguardApi<Error = Error>,
{
    api.configure_device(interface, config)
        .map_err(|err| Error::configure(interface, err))
}

fn lookup<'a>(devices: &'a [Device], name: &str) -> Option<&'a Device> {
    let found = device::find(devices, name);
    if found.is_none() {
        log::warn!("device {name} not found");
    }
    found
}

fn show<W>(api: &mut W, args: ShowArgs, out: &mut impl Write) -> Result<(), Error>
where
    W: WireguardApi<Error = Error>,
{
    let devices = list_devices(api)?;

    match ShowTarget::resolve(args.interface.as_deref()) {
        ShowTarget::All => report::all(out, &devices)?,
        ShowTarget::Interfaces => report::interfaces(out, &devices)?,
        ShowTarget::Device(name) => {
            let found = lookup(&devices, name);
            match args.field {
                None => match found {
                    Some(device) => report::device(out, device)?,
                    None => writeln!(out)?,
                },
                Some(ShowField::Endpoints) => report::endpoints(out, found)?,
                Some(ShowField::AllowedIps) => report::allowed_ips(out, found)?,
                Some(ShowField::Fwmark) => report::fwmark(out, found)?,
                Some(ShowField::Transfer) => report::transfer(out, found)?,
                Some(ShowField::PublicKey) => report::public_key(out, found)?,
                Some(ShowField::ListenPort) => report::listen_port(out, found)?,
            }
        }
    }

    Ok(())
}

pub fn set_config(key: SetKey, value: &str) -> Result<Config, ParseError> {
    let mut config = Config::default();
    match key {
        SetKey::Fwmark => config.firewall_mark = Some(parse_fwmark(value)?),
        SetKey::ListenPort => config.listen_port = Some(parse_listen_port(value)?),
    }
    Ok(config)
}
