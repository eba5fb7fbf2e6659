//! Client membership events

use std::net::SocketAddr;

use crate::transport::RawSocket;

/// Emitted when a client joins or leaves a server
///
/// Every `Added` is followed by exactly one `Removed` for the same socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    /// Client connection accepted
    Added { socket: RawSocket, addr: SocketAddr },

    /// Client dropped, evicted or shut down
    Removed { socket: RawSocket, addr: SocketAddr },
}

impl ClientEvent {
    pub fn socket(&self) -> RawSocket {
        match *self {
            ClientEvent::Added { socket, .. } | ClientEvent::Removed { socket, .. } => socket,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        match *self {
            ClientEvent::Added { addr, .. } | ClientEvent::Removed { addr, .. } => addr,
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, ClientEvent::Added { .. })
    }
}
