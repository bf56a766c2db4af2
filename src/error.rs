use std::io;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("interface {name} not found")]
    InterfaceNotFound { name: String },

    /// The response failed the cross-check against its request.
    #[error("DHCP protocol error: {0}")]
    Protocol(String),

    #[error("no DHCP response within {0:?}")]
    Timeout(Duration),

    #[error("command `{command}` failed: {detail}")]
    Command { command: String, detail: String },
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
