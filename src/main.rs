use std::{io, process::ExitCode};

use clap::Parser;
use command::Command;
use error::Error;
use settings::Settings;
use wg::client::Client;

mod command;
pub(crate) mod error;
mod report;
mod settings;
mod wg;

#[derive(Debug, clap::Parser)]
#[command(name = "wgctrl", version, about = "Inspect and configure WireGuard interfaces")]
pub struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::debug!("{err:?}");
            eprintln!("{}", failure_message(&err));
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(args: Args) -> Result<(), Error> {
    let settings = Settings::default();
    let mut client = Client::open(&settings)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    command::run(&mut client, args.command, &mut out)
}

fn failure_message(err: &Error) -> String {
    format!("wgctrl: {err}")
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Args, failure_message};
    use crate::{
        command::{Command, SetKey, ShowField},
        error::Error,
    };

    #[test]
    fn cli_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn no_arguments_means_no_command() {
        assert!(Args::try_parse_from(["wgctrl"]).unwrap().command.is_none());
    }

    #[test]
    fn positional_slots() {
        let args = Args::try_parse_from(["wgctrl", "show", "wg0", "allowed-ips"]).unwrap();
        match args.command {
            Some(Command::Show(show)) => {
                assert_eq!(show.interface.as_deref(), Some("wg0"));
                assert_eq!(show.field, Some(ShowField::AllowedIps));
            }
            other => panic!("unexpected {other:?}"),
        }

        let args = Args::try_parse_from(["wgctrl", "set", "wg0", "fwmark", "0x0"]).unwrap();
        match args.command {
            Some(Command::Set {
                interface,
                key,
                value,
            }) => {
                assert_eq!(interface, "wg0");
                assert_eq!(key, SetKey::Fwmark);
                assert_eq!(value, "0x0");
            }
            other => panic!("unexpected {other:?}"),
        }

        let args = Args::try_parse_from(["wgctrl", "setconf", "wg0", "/etc/wg0.conf"]).unwrap();
        assert!(matches!(args.command, Some(Command::Setconf { .. })));
    }

    #[test]
    fn usage_errors() {
        assert!(Args::try_parse_from(["wgctrl", "showconf"]).is_err());
        assert!(Args::try_parse_from(["wgctrl", "setconf", "wg0"]).is_err());
        assert!(Args::try_parse_from(["wgctrl", "set", "wg0", "mtu", "1400"]).is_err());
        assert!(Args::try_parse_from(["wgctrl", "show", "wg0", "bogus"]).is_err());
    }

    #[test]
    fn failure_is_one_prefixed_line() {
        let err = Error::configure("wg0", Error::Errno(19));
        let message = failure_message(&err);

        assert!(message.starts_with("wgctrl: "));
        assert!(message.contains("wg0"));
        assert!(!message.contains('\n'));
        assert_eq!(err.exit_code(), 1);
    }
}
