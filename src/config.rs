//! Configuration inputs for the control connection.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::DEFAULT_MAX_LINE_LEN;

/// Configuration for connecting to a daemon's control endpoint.
///
/// Reconnection is deliberately absent: a failed connection is terminal for
/// this crate, and retry policy belongs to the caller.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// The endpoint to connect to.
    pub address: ConnectionAddress,
    /// Password for HASHEDPASSWORD authentication, when one is configured.
    pub password: Option<String>,
    /// Cookie file path overriding the one advertised by PROTOCOLINFO.
    pub cookie_file: Option<PathBuf>,
    /// Directory holding per-service client authorization keys.
    pub auth_dir: Option<PathBuf>,
    /// Timeout for establishing the transport connection.
    pub connect_timeout: Duration,
    /// Default per-command deadline; `None` waits indefinitely.
    pub command_timeout: Option<Duration>,
    /// Maximum accepted length of one protocol line.
    pub max_line_len: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            address: ConnectionAddress::default(),
            password: None,
            cookie_file: None,
            auth_dir: None,
            connect_timeout: Duration::from_secs(30),
            command_timeout: None,
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

impl ControlConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint address.
    pub fn address(mut self, address: ConnectionAddress) -> Self {
        self.address = address;
        self
    }

    /// Connect to a TCP endpoint.
    pub fn tcp(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.address = ConnectionAddress::Tcp(addr.into());
        self
    }

    /// Connect to a Unix socket endpoint.
    pub fn unix(mut self, path: impl Into<PathBuf>) -> Self {
        self.address = ConnectionAddress::Unix(path.into());
        self
    }

    /// Supply a password credential.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Override the cookie file advertised by the daemon.
    pub fn cookie_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookie_file = Some(path.into());
        self
    }

    /// Set the client authorization key directory.
    pub fn auth_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.auth_dir = Some(path.into());
        self
    }

    /// Set the transport connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the default per-command deadline.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Set the maximum protocol line length.
    pub fn max_line_len(mut self, len: usize) -> Self {
        self.max_line_len = len;
        self
    }
}

/// A control endpoint address.
#[derive(Debug, Clone)]
pub enum ConnectionAddress {
    /// TCP socket address.
    Tcp(SocketAddr),
    /// Unix domain socket path.
    Unix(PathBuf),
}

impl Default for ConnectionAddress {
    fn default() -> Self {
        // The daemon's conventional control port.
        ConnectionAddress::Tcp("127.0.0.1:9051".parse().expect("static address"))
    }
}

impl ConnectionAddress {
    /// Parse an endpoint string: `host:port` for TCP, `unix:/path` for a
    /// Unix socket.
    pub fn parse(s: &str) -> Result<Self, String> {
        if let Some(path) = s.strip_prefix("unix:") {
            Ok(ConnectionAddress::Unix(PathBuf::from(path)))
        } else {
            s.parse::<SocketAddr>()
                .map(ConnectionAddress::Tcp)
                .map_err(|e| format!("invalid endpoint '{}': {}", s, e))
        }
    }
}

impl std::fmt::Display for ConnectionAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionAddress::Tcp(addr) => write!(f, "{}", addr),
            ConnectionAddress::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}
