//! Error types for SRT sessions
//!
//! Errors are split by where they surface: configuration updates, resource
//! acquisition during `start`, and raw transport failures. The crate-level
//! [`Error`] wraps all of them for the element lifecycle calls.

use std::net::SocketAddr;

use thiserror::Error;

use crate::transport::{SocketState, TransportError};

/// Result type for element operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Failed to acquire transport resources while starting
    #[error("connection setup failed: {0}")]
    Connect(#[from] ConnectError),

    /// Transport failure outside of a send or receive
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Sending a buffer failed
    #[error("write failed: {0}")]
    Write(#[source] TransportError),

    /// Waiting for or receiving a buffer failed
    #[error("read failed: {0}")]
    Read(#[source] TransportError),

    /// Operation requires a started element
    #[error("element not started")]
    NotStarted,

    /// The accept thread could not be spawned
    #[error("failed to spawn accept thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
}

/// Configuration errors
///
/// A rejected update never modifies the previous configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// URI could not be parsed
    #[error("invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// URI scheme is not `srt`
    #[error("invalid SRT URI scheme '{0}'")]
    InvalidScheme(String),

    /// URI has no port
    #[error("URI '{0}' has no port")]
    MissingPort(String),

    /// Key length outside {16, 24, 32}
    #[error("invalid key length {0}, expected 16, 24 or 32")]
    InvalidKeyLength(u32),

    /// Setting cannot change while the element is started
    #[error("'{0}' cannot be changed while started")]
    Busy(&'static str),
}

/// Resource acquisition failures during connection setup
///
/// Every handle acquired before the failure has been released by the time one
/// of these is returned.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Host is empty
    #[error("invalid host: unspecified host")]
    InvalidHost,

    /// Host and port did not resolve to an address
    #[error("cannot resolve address {host}:{port}")]
    AddressResolution { host: String, port: u16 },

    /// Readiness multiplexer could not be created
    #[error("failed to create poll id for SRT socket: {0}")]
    MultiplexerInit(#[source] TransportError),

    /// Transport socket could not be created
    #[error("failed to create SRT socket: {0}")]
    SocketCreate(#[source] TransportError),

    /// Binding the local address failed
    #[error("can't bind to {addr}: {reason}")]
    Bind { addr: String, reason: String },

    /// Listening on the bound socket failed
    #[error("failed to listen on SRT socket: {0}")]
    Listen(#[source] TransportError),

    /// Connect call failed
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: TransportError,
    },

    /// Connect returned but the socket is not connected
    #[error("socket not connected (state {0:?})")]
    NotConnected(SocketState),

    /// Socket could not be registered with the multiplexer
    #[error("failed to register socket with poll: {0}")]
    Register(#[source] TransportError),
}
