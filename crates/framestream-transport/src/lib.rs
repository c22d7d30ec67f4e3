//! Raw connection plumbing for framestream.
//!
//! The framing layer only needs something that reads, writes and flushes
//! bytes. This crate provides the concrete connections the CLI and tests use:
//! - Unix domain sockets (Linux/macOS)
//! - TCP
//!
//! Everything here is blocking. Timeouts are applied on the [`Connection`]
//! itself; the framing layer never checks for cancellation.

pub mod connection;
pub mod endpoint;
pub mod error;
pub mod tcp;

#[cfg(unix)]
pub mod uds;

pub use connection::Connection;
pub use endpoint::{Endpoint, Listener};
pub use error::{Result, TransportError};
pub use tcp::TcpSocket;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
