//! Server configuration

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use crate::error::{ConfigError, ConnectError, Error, Result};
use crate::protocol::constants::*;
use crate::session::config::SessionConfig;

/// Server configuration options
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Shared session settings; `uri` is the local listen address
    pub session: SessionConfig,

    /// Listen backlog (`None` = role default)
    pub backlog: Option<u32>,

    /// Receiver only: give up waiting for a client after this long
    pub wait_timeout: Option<Duration>,
}

impl ServerConfig {
    /// Create a config listening on `uri`
    pub fn new(uri: &str) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            session: SessionConfig::with_uri(uri)?,
            ..Default::default()
        })
    }

    pub fn with_session(session: SessionConfig) -> Self {
        Self {
            session,
            ..Default::default()
        }
    }

    /// Set the listen backlog
    pub fn backlog(mut self, backlog: u32) -> Self {
        self.backlog = Some(backlog);
        self
    }

    /// Set how long the receiver waits for a client
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    /// Set the wait timeout from its millisecond property value (-1 = forever)
    pub fn set_wait_timeout_ms(&mut self, ms: i32) {
        self.wait_timeout = u64::try_from(ms).ok().map(Duration::from_millis);
    }

    /// Resolve the local listen address
    ///
    /// A URI without a host listens on every IPv4 interface. The port is
    /// required.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let uri = &self.session.uri;
        let port = uri.require_port()?;
        let host = uri
            .host()
            .unwrap_or_else(|| SRT_DEFAULT_BIND_ADDRESS.to_string());

        let resolved = (host.as_str(), port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next());

        resolved.ok_or(Error::Connect(ConnectError::AddressResolution { host, port }))
    }
}

impl AsRef<SessionConfig> for ServerConfig {
    fn as_ref(&self) -> &SessionConfig {
        &self.session
    }
}

impl AsMut<SessionConfig> for ServerConfig {
    fn as_mut(&mut self) -> &mut SessionConfig {
        &mut self.session
    }
}
