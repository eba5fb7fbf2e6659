//! Client configuration

use crate::error::ConfigError;
use crate::protocol::options::Role;
use crate::session::config::SessionConfig;

use super::connector::ConnectRequest;

/// Client configuration options
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Shared session settings; `uri` is the remote listener
    pub session: SessionConfig,

    /// Local address to bind before connecting
    pub bind_address: Option<String>,

    /// Local port to bind before connecting (0 = any)
    pub bind_port: u16,

    /// Rendezvous mode; binds the local side to the remote port
    pub rendezvous: bool,
}

impl ClientConfig {
    /// Create a config connecting to `uri`
    pub fn new(uri: &str) -> Result<Self, ConfigError> {
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

    /// Set the local bind address
    pub fn bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = Some(address.into());
        self
    }

    /// Set the local bind port
    pub fn bind_port(mut self, port: u16) -> Self {
        self.bind_port = port;
        self
    }

    /// Enable rendezvous mode
    pub fn rendezvous(mut self, enabled: bool) -> Self {
        self.rendezvous = enabled;
        self
    }

    /// Build the connect request for a socket in `role`
    pub fn connect_request(&self, role: Role) -> Result<ConnectRequest, ConfigError> {
        let uri = &self.session.uri;

        Ok(ConnectRequest {
            host: uri.host().unwrap_or_default(),
            port: uri.require_port()?,
            profile: self.session.option_profile(role).rendezvous(self.rendezvous),
            bind_address: self.bind_address.clone(),
            bind_port: self.bind_port,
        })
    }
}

impl AsRef<SessionConfig> for ClientConfig {
    fn as_ref(&self) -> &SessionConfig {
        &self.session
    }
}

impl AsMut<SessionConfig> for ClientConfig {
    fn as_mut(&mut self) -> &mut SessionConfig {
        &mut self.session
    }
}
