use std::path::PathBuf;

use crate::wg::config::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open wireguard control: {0}")]
    Open(#[source] std::io::Error),

    #[error("failed to get devices: {0}")]
    List(#[source] Box<Error>),

    #[error("error setting configuration for {device}: {source}")]
    Configure {
        device: String,
        #[source]
        source: Box<Error>,
    },

    #[error("device {0} not found")]
    DeviceNotFound(String),

    #[error("wg cmd fail: {0:?}")]
    WgCommandFail(Option<i32>),

    #[error("uapi errno {0}")]
    Errno(i32),

    #[error("malformed device state: {0}")]
    Malformed(String),

    #[error("error reading file {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    ParseError(#[from] ParseError),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    pub fn list(err: Error) -> Self {
        Error::List(Box::new(err))
    }

    pub fn configure(device: &str, err: Error) -> Self {
        Error::Configure {
            device: device.to_string(),
            source: Box::new(err),
        }
    }

    /// Process exit status: 2 for bad user input, 1 for device failures.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::ParseError(_) | Error::ReadFile { .. } => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_split_input_from_device_errors() {
        assert_eq!(Error::from(ParseError::Cidr("10.0.0.0".into())).exit_code(), 2);
        assert_eq!(Error::list(Error::Errno(19)).exit_code(), 1);
        assert_eq!(
            Error::configure("wg0", Error::DeviceNotFound("wg0".into())).exit_code(),
            1
        );
    }

    #[test]
    fn messages_carry_the_cause() {
        let err = Error::configure("wg0", Error::Errno(22));
        assert_eq!(
            err.to_string(),
            "error setting configuration for wg0: uapi errno 22"
        );
    }
}
