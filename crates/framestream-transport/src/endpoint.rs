use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::connection::Connection;
use crate::error::{Result, TransportError};
use crate::tcp::TcpSocket;

#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// Where to bind or connect.
///
/// Accepted forms:
/// - `unix:/run/app.sock`
/// - `tcp:127.0.0.1:7400`
/// - a bare path (treated as `unix:`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self> {
        let invalid = |reason| TransportError::InvalidEndpoint {
            input: input.to_string(),
            reason,
        };

        if let Some(addr) = input.strip_prefix("tcp:") {
            if addr.is_empty() {
                return Err(invalid("missing host:port after tcp:"));
            }
            if !addr.contains(':') {
                return Err(invalid("tcp endpoint needs host:port"));
            }
            return Ok(Self::Tcp(addr.to_string()));
        }

        let path = input.strip_prefix("unix:").unwrap_or(input);
        if path.is_empty() {
            return Err(invalid("empty socket path"));
        }
        Ok(Self::Unix(PathBuf::from(path)))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

impl Endpoint {
    /// Connect to this endpoint (blocking).
    pub fn connect(&self) -> Result<Connection> {
        match self {
            #[cfg(unix)]
            Self::Unix(path) => UnixDomainSocket::connect(path),
            #[cfg(not(unix))]
            Self::Unix(_) => Err(TransportError::Unsupported("unix")),
            Self::Tcp(addr) => TcpSocket::connect(addr),
        }
    }

    /// Bind a listener on this endpoint.
    pub fn bind(&self) -> Result<Listener> {
        match self {
            #[cfg(unix)]
            Self::Unix(path) => Ok(Listener::Unix(UnixDomainSocket::bind(path)?)),
            #[cfg(not(unix))]
            Self::Unix(_) => Err(TransportError::Unsupported("unix")),
            Self::Tcp(addr) => Ok(Listener::Tcp(TcpSocket::bind(addr)?)),
        }
    }
}

/// A bound listener of either kind.
pub enum Listener {
    #[cfg(unix)]
    Unix(UnixDomainSocket),
    Tcp(TcpSocket),
}

impl Listener {
    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<Connection> {
        match self {
            #[cfg(unix)]
            Self::Unix(listener) => listener.accept(),
            Self::Tcp(listener) => listener.accept(),
        }
    }

    /// The endpoint this listener is actually bound to (ephemeral TCP ports
    /// are resolved).
    pub fn local_endpoint(&self) -> Endpoint {
        match self {
            #[cfg(unix)]
            Self::Unix(listener) => Endpoint::Unix(listener.path().to_path_buf()),
            Self::Tcp(listener) => Endpoint::Tcp(listener.local_addr().to_string()),
        }
    }
}
