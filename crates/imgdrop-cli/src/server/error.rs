//! Failures that stop the upload server.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

pub type ServerResult<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Listener settings rejected before binding.
    #[error("invalid listener settings: {0}")]
    InvalidConfig(String),

    /// The listening socket could not be opened.
    #[error("cannot listen on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The server stopped accepting uploads because of an I/O failure.
    #[error("upload server stopped unexpectedly")]
    Serve(#[source] io::Error),

    /// Certificate or key missing, empty or unreadable.
    #[error("cannot load TLS material: {0}")]
    #[cfg_attr(not(feature = "tls"), allow(dead_code))]
    Tls(String),
}

impl ServerError {
    /// Returns an operator hint for the failure, if there is an obvious one.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidConfig(_) => Some("run `imgdrop --help` for the accepted values"),
            Self::Bind { source, .. } => match source.kind() {
                io::ErrorKind::AddrInUse => {
                    Some("another process holds the port, pick a different one with --port")
                }
                io::ErrorKind::PermissionDenied => {
                    Some("the port needs privileges this process lacks, pick one above 1024")
                }
                io::ErrorKind::AddrNotAvailable => {
                    Some("no local interface has that address, check --host")
                }
                _ => None,
            },
            Self::Serve(_) => None,
            Self::Tls(_) => Some("check --tls-cert-path and --tls-key-path point to PEM files"),
        }
    }
}
