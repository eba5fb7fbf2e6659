//! Socket option profile
//!
//! Maps a role and its security/latency settings onto the ordered list of
//! option assignments applied to a transport socket before connect or bind.

use std::fmt;

use crate::error::ConfigError;

use super::constants::*;

/// Whether the socket sends or receives media
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

impl Role {
    pub fn is_sender(self) -> bool {
        self == Role::Sender
    }
}

/// Encryption key length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyLength {
    #[default]
    Aes128,
    Aes192,
    Aes256,
}

impl KeyLength {
    /// Key length in bytes
    pub fn bytes(self) -> u32 {
        match self {
            KeyLength::Aes128 => 16,
            KeyLength::Aes192 => 24,
            KeyLength::Aes256 => 32,
        }
    }
}

impl TryFrom<u32> for KeyLength {
    type Error = ConfigError;

    fn try_from(bytes: u32) -> Result<Self, Self::Error> {
        match bytes {
            16 => Ok(KeyLength::Aes128),
            24 => Ok(KeyLength::Aes192),
            32 => Ok(KeyLength::Aes256),
            other => Err(ConfigError::InvalidKeyLength(other)),
        }
    }
}

/// Passphrase that never shows up in logs
#[derive(Clone, PartialEq, Eq)]
pub struct Passphrase(String);

impl Passphrase {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self(passphrase.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(***)")
    }
}

/// A single transport socket option assignment
#[derive(Debug, Clone, PartialEq)]
pub enum SocketOption {
    /// Blocking send (`false` makes sends non-blocking)
    SendSync(bool),
    /// Timestamp-based packet delivery
    TsbpdMode(bool),
    /// Linger time on close in seconds (0 disables)
    Linger(i32),
    /// Socket is the sending side
    Sender(bool),
    /// Minimum latency requested from the peer, in ms
    PeerLatency(u32),
    /// Receiver buffering latency, in ms
    RecvLatency(u32),
    /// Rendezvous connection mode
    Rendezvous(bool),
    Passphrase(Passphrase),
    KeyLength(KeyLength),
    IpTos(i32),
    /// Maximum bandwidth in bytes/s (0 = relative to input rate)
    MaxBandwidth(i64),
    /// Overhead bandwidth in percent of the input rate
    OverheadBandwidth(i32),
    /// UDP send buffer in bytes
    UdpSendBuffer(usize),
}

/// Inputs to the option profile
#[derive(Debug, Clone)]
pub struct OptionProfile {
    pub role: Role,
    pub latency_ms: u32,
    pub passphrase: Option<Passphrase>,
    pub key_length: KeyLength,
    pub rendezvous: bool,
}

impl OptionProfile {
    pub fn new(role: Role, latency_ms: u32) -> Self {
        Self {
            role,
            latency_ms,
            passphrase: None,
            key_length: KeyLength::default(),
            rendezvous: false,
        }
    }

    pub fn encryption(mut self, passphrase: Option<Passphrase>, key_length: KeyLength) -> Self {
        self.passphrase = passphrase;
        self.key_length = key_length;
        self
    }

    pub fn rendezvous(mut self, rendezvous: bool) -> Self {
        self.rendezvous = rendezvous;
        self
    }

    /// Build the ordered option list
    pub fn options(&self) -> Vec<SocketOption> {
        let sender = self.role.is_sender();
        let mut options = vec![
            SocketOption::SendSync(false),
            SocketOption::TsbpdMode(true),
            SocketOption::Linger(0),
            SocketOption::Sender(sender),
        ];

        // A sender advertises the minimum latency it expects from the receiver
        if sender {
            options.push(SocketOption::PeerLatency(self.latency_ms));
        } else {
            options.push(SocketOption::RecvLatency(self.latency_ms));
        }

        if sender {
            options.push(SocketOption::IpTos(SENDER_IP_TOS));
            options.push(SocketOption::MaxBandwidth(0));
            options.push(SocketOption::OverheadBandwidth(SENDER_OVERHEAD_BW_PERCENT));
            options.push(SocketOption::UdpSendBuffer(SRT_SEND_BUFFER_SIZE));
        }

        options.push(SocketOption::Rendezvous(self.rendezvous));

        if let Some(ref passphrase) = self.passphrase {
            if !passphrase.expose().is_empty() {
                options.push(SocketOption::Passphrase(passphrase.clone()));
                options.push(SocketOption::KeyLength(self.key_length));
            }
        }

        options
    }
}
