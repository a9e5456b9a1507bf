//! Address resolver & connector (C4, spec §4.4). Parses `host:port` and
//! filesystem-socket address forms, and connects with a per-attempt
//! timeout. The teacher's `net` module talks to `std::net::TcpStream`
//! directly rather than through a crate; this follows the same style and
//! adds `UnixStream` for the local-socket form.

use crate::error::ConnectError;
use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A configured server's address: either a TCP endpoint or a filesystem socket path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServerAddress {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

impl ServerAddress {
    /// Parse a `"host:port"` or absolute-path address spec (spec §6 Address forms).
    pub fn parse(spec: &str) -> Result<ServerAddress, String> {
        if spec.starts_with('/') {
            return Ok(ServerAddress::Unix(PathBuf::from(spec)));
        }

        let (host, port) = spec
            .rsplit_once(':')
            .ok_or_else(|| format!("expected host:port or an absolute path, got `{}`", spec))?;

        let port: u16 = port
            .parse()
            .map_err(|_| format!("invalid port `{}` in `{}`", port, spec))?;

        Ok(ServerAddress::Tcp { host: host.to_owned(), port })
    }

    /// Canonical string form used to key result maps (spec §6 Visible server identity).
    pub fn canonical(&self) -> String {
        match self {
            ServerAddress::Tcp { host, port } => format!("{}:{}", host, port),
            ServerAddress::Unix(path) => path.display().to_string(),
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Either half of a connected socket. Implements `Read`/`Write` so the protocol engine
/// (C6) can treat both address families identically.
pub enum Socket {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl Socket {
    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        match self {
            Socket::Tcp(s) => s.set_nonblocking(nonblocking),
            Socket::Unix(s) => s.set_nonblocking(nonblocking),
        }
    }
}

impl io::Read for Socket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Socket::Tcp(s) => s.read(buf),
            Socket::Unix(s) => s.read(buf),
        }
    }
}

impl io::Write for Socket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Socket::Tcp(s) => s.write(buf),
            Socket::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Socket::Tcp(s) => s.flush(),
            Socket::Unix(s) => s.flush(),
        }
    }
}

/// Exposes the raw fd so the dispatcher (C7) can register the socket with `mio::Poll` via
/// `SourceFd`, without needing a mio-native socket type for the Unix-domain half.
impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        match self {
            Socket::Tcp(s) => s.as_raw_fd(),
            Socket::Unix(s) => s.as_raw_fd(),
        }
    }
}

/// Connect to `address`, trying every resolved candidate in order, each bounded by
/// `connect_timeout` (0 = no timeout). The overall connect may exceed
/// `connect_timeout` if multiple candidates are tried — this is intentional (spec §4.4).
pub fn connect(address: &ServerAddress, connect_timeout: Duration) -> Result<Socket, ConnectError> {
    match address {
        ServerAddress::Tcp { host, port } => connect_tcp(host, *port, connect_timeout),
        ServerAddress::Unix(path) => connect_unix(path),
    }
}

fn connect_tcp(host: &str, port: u16, connect_timeout: Duration) -> Result<Socket, ConnectError> {
    let candidates: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(ConnectError::Io)?
        .collect();

    let mut last_err: Option<ConnectError> = None;

    for candidate in candidates {
        let attempt = if connect_timeout.is_zero() {
            TcpStream::connect(candidate)
        } else {
            TcpStream::connect_timeout(&candidate, connect_timeout)
        };

        match attempt {
            Ok(stream) => {
                stream.set_nonblocking(true).map_err(ConnectError::Io)?;
                stream.set_nodelay(true).map_err(ConnectError::Io)?;
                return Ok(Socket::Tcp(stream));
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                last_err = Some(ConnectError::TimedOut);
            }
            Err(e) => last_err = Some(ConnectError::Io(e)),
        }
    }

    Err(last_err.unwrap_or(ConnectError::TimedOut))
}

fn connect_unix(path: &Path) -> Result<Socket, ConnectError> {
    let stream = UnixStream::connect(path).map_err(ConnectError::Io)?;
    stream.set_nonblocking(true).map_err(ConnectError::Io)?;
    Ok(Socket::Unix(stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp() {
        assert_eq!(
            ServerAddress::parse("10.0.0.1:11211").unwrap(),
            ServerAddress::Tcp { host: "10.0.0.1".into(), port: 11211 }
        );
    }

    #[test]
    fn parses_unix() {
        assert_eq!(
            ServerAddress::parse("/var/run/memcached.sock").unwrap(),
            ServerAddress::Unix(PathBuf::from("/var/run/memcached.sock"))
        );
    }

    #[test]
    fn canonical_form_matches_spec() {
        assert_eq!(ServerAddress::Tcp { host: "h".into(), port: 1 }.canonical(), "h:1");
        assert_eq!(ServerAddress::Unix(PathBuf::from("/a/b")).canonical(), "/a/b");
    }

    #[test]
    fn rejects_garbage() {
        assert!(ServerAddress::parse("not-an-address").is_err());
    }
}
