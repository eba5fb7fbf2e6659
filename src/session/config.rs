//! Session configuration
//!
//! Settings shared by every role. Validated setters reject bad values and
//! leave the previous value in place.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use url::{Host, Url};

use crate::error::ConfigError;
use crate::protocol::constants::*;
use crate::protocol::options::{KeyLength, OptionProfile, Passphrase, Role};

use super::caps::Caps;

/// A parsed `srt://host:port` URI
#[derive(Clone, PartialEq, Eq)]
pub struct SrtUri(Url);

impl SrtUri {
    /// Parse and validate an SRT URI
    pub fn parse(uri: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(uri).map_err(|e| ConfigError::InvalidUri {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;

        if url.scheme() != SRT_URI_SCHEME {
            return Err(ConfigError::InvalidScheme(url.scheme().to_string()));
        }

        Ok(Self(url))
    }

    /// Host without IPv6 brackets, if present
    pub fn host(&self) -> Option<String> {
        match self.0.host()? {
            Host::Domain(domain) if domain.is_empty() => None,
            Host::Domain(domain) => Some(domain.to_string()),
            Host::Ipv4(addr) => Some(addr.to_string()),
            Host::Ipv6(addr) => Some(addr.to_string()),
        }
    }

    pub fn port(&self) -> Option<u16> {
        self.0.port()
    }

    /// Port, or `MissingPort` if the URI has none
    pub fn require_port(&self) -> Result<u16, ConfigError> {
        self.port()
            .ok_or_else(|| ConfigError::MissingPort(self.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for SrtUri {
    fn default() -> Self {
        Self(Url::parse(SRT_DEFAULT_URI).expect("default SRT URI is valid"))
    }
}

impl FromStr for SrtUri {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SrtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl fmt::Debug for SrtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SrtUri({})", self.0.as_str())
    }
}

/// Convert the `poll-timeout` property value (ms, -1 = infinite)
pub fn poll_timeout_from_ms(ms: i32) -> Option<Duration> {
    u64::try_from(ms).ok().map(Duration::from_millis)
}

/// Settings common to every role
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote address for clients, local listen address for servers
    pub uri: SrtUri,

    /// Receiver buffering latency; senders advertise it as the peer minimum
    pub latency_ms: u32,

    /// Enables encryption when set and non-empty
    pub passphrase: Option<Passphrase>,

    /// Encryption key length, used only with a passphrase
    pub key_length: KeyLength,

    /// Upper bound for readiness waits (`None` = wait forever)
    pub poll_timeout: Option<Duration>,

    /// Stream capabilities handed through to the framework
    pub caps: Option<Caps>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            uri: SrtUri::default(),
            latency_ms: SRT_DEFAULT_LATENCY_MS,
            passphrase: None,
            key_length: KeyLength::default(),
            poll_timeout: None,
            caps: None,
        }
    }
}

impl SessionConfig {
    /// Create a config for the given URI
    pub fn with_uri(uri: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            uri: SrtUri::parse(uri)?,
            ..Default::default()
        })
    }

    /// Set latency in milliseconds
    pub fn latency(mut self, latency_ms: u32) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Enable encryption
    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(Passphrase::new(passphrase));
        self
    }

    pub fn key_length(mut self, key_length: KeyLength) -> Self {
        self.key_length = key_length;
        self
    }

    pub fn poll_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn caps(mut self, caps: Caps) -> Self {
        self.caps = Some(caps);
        self
    }

    /// Replace the URI; a rejected URI leaves the old one in place
    pub fn set_uri(&mut self, uri: &str) -> Result<(), ConfigError> {
        self.uri = SrtUri::parse(uri)?;
        Ok(())
    }

    /// Set the key length in bytes; only 16, 24 and 32 are accepted
    pub fn set_key_length(&mut self, bytes: u32) -> Result<(), ConfigError> {
        self.key_length = KeyLength::try_from(bytes)?;
        Ok(())
    }

    /// Set the poll timeout from its millisecond property value
    pub fn set_poll_timeout_ms(&mut self, ms: i32) {
        self.poll_timeout = poll_timeout_from_ms(ms);
    }

    /// Option profile for a socket in the given role
    pub fn option_profile(&self, role: Role) -> OptionProfile {
        OptionProfile::new(role, self.latency_ms)
            .encryption(self.passphrase.clone(), self.key_length)
    }
}

impl AsRef<SessionConfig> for SessionConfig {
    fn as_ref(&self) -> &SessionConfig {
        self
    }
}

impl AsMut<SessionConfig> for SessionConfig {
    fn as_mut(&mut self) -> &mut SessionConfig {
        self
    }
}
