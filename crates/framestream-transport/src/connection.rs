use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// A connected bidirectional byte channel.
///
/// This is the raw connection a framestream `Stream` is built over. It is
/// unbuffered; the framing layer wraps each direction in its own buffer.
pub struct Connection {
    inner: ConnectionInner,
}

enum ConnectionInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Tcp(TcpStream),
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.read(buf),
            ConnectionInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.write(buf),
            ConnectionInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.flush(),
            ConnectionInner::Tcp(stream) => stream.flush(),
        }
    }
}

#[cfg(unix)]
impl From<std::os::unix::net::UnixStream> for Connection {
    fn from(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: ConnectionInner::Unix(stream),
        }
    }
}

impl From<TcpStream> for Connection {
    fn from(stream: TcpStream) -> Self {
        Self {
            inner: ConnectionInner::Tcp(stream),
        }
    }
}

impl Connection {
    /// Set read timeout on the underlying socket.
    ///
    /// A blocked read that exceeds the timeout fails with
    /// `WouldBlock`/`TimedOut`, which the framing layer reports as an I/O fault.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            ConnectionInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying socket.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            ConnectionInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this connection (creates a new handle to the same socket).
    ///
    /// Used to give the read and write directions their own owner.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => Ok(Self::from(stream.try_clone()?)),
            ConnectionInner::Tcp(stream) => Ok(Self::from(stream.try_clone()?)),
        }
    }

    /// Shut down the write direction, signalling end-of-file to the peer.
    pub fn shutdown_write(&self) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.shutdown(Shutdown::Write).map_err(Into::into),
            ConnectionInner::Tcp(stream) => stream.shutdown(Shutdown::Write).map_err(Into::into),
        }
    }

    /// Human-readable description of the remote side, for logs.
    pub fn peer_label(&self) -> String {
        match &self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(_) => match self.peer_credentials() {
                Some((uid, _gid, pid)) => format!("unix:pid={pid},uid={uid}"),
                None => "unix".to_string(),
            },
            ConnectionInner::Tcp(stream) => match stream.peer_addr() {
                Ok(addr) => format!("tcp:{addr}"),
                Err(_) => "tcp".to_string(),
            },
        }
    }

    /// Get the credentials of a Unix domain socket peer (Linux only).
    ///
    /// Returns `(uid, gid, pid)` via `SO_PEERCRED`, or `None` if unavailable
    /// or the connection is not a Unix socket.
    #[cfg(target_os = "linux")]
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        use std::os::fd::AsRawFd;

        let fd = match &self.inner {
            ConnectionInner::Unix(stream) => stream.as_raw_fd(),
            ConnectionInner::Tcp(_) => return None,
        };

        let mut cred = libc::ucred {
            pid: 0,
            uid: 0,
            gid: 0,
        };
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;

        // SAFETY: `cred` and `len` are valid writable pointers for the provided sizes,
        // and `fd` is an open Unix socket descriptor owned by this process.
        let rc = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                (&mut cred as *mut libc::ucred).cast::<libc::c_void>(),
                &mut len,
            )
        };

        if rc == 0 && len as usize == std::mem::size_of::<libc::ucred>() {
            Some((cred.uid, cred.gid, cred.pid as u32))
        } else {
            None
        }
    }

    /// Get the credentials of the connected peer.
    ///
    /// Returns `None` on platforms that do not expose peer credentials.
    #[cfg(not(target_os = "linux"))]
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        None
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(_) => "unix-domain-socket",
            ConnectionInner::Tcp(_) => "tcp",
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("type", &self.transport_name())
            .finish()
    }
}
