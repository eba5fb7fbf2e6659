//! Per-client state stored in the registry

use std::net::SocketAddr;

use crate::protocol::constants::{DEFAULT_MSG_SIZE, MAX_SEND_FAILS, SRT_SEND_BUFFER_SIZE};
use crate::transport::SrtSocket;

use super::event::ClientEvent;

/// Outcome of a backpressure check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backpressure {
    /// Send buffer has room
    Clear,
    /// Send buffer is nearly full; carries the consecutive failure count
    Congested(u32),
    /// Too many consecutive congested checks
    Evict,
}

/// A connected client of a server
#[derive(Debug)]
pub struct ClientRecord {
    pub id: u64,
    pub socket: SrtSocket,
    pub peer: SocketAddr,
    /// Consecutive backpressure failures
    pub send_failures: u32,
}

impl ClientRecord {
    pub fn new(id: u64, socket: SrtSocket, peer: SocketAddr) -> Self {
        Self {
            id,
            socket,
            peer,
            send_failures: 0,
        }
    }

    /// Check whether one more message fits into the send buffer
    ///
    /// A congested check bumps the failure count and a clear one resets it.
    /// An unreadable unacknowledged byte count is treated as clear.
    pub fn check_backpressure(&mut self) -> Backpressure {
        let congested = match self.socket.unacked_bytes() {
            Ok(unacked) => unacked + DEFAULT_MSG_SIZE >= SRT_SEND_BUFFER_SIZE,
            Err(e) => {
                tracing::debug!(socket = self.socket.raw(), error = %e, "Failed to read unacked bytes");
                false
            }
        };

        if !congested {
            self.send_failures = 0;
            return Backpressure::Clear;
        }

        self.send_failures += 1;
        if self.send_failures >= MAX_SEND_FAILS {
            Backpressure::Evict
        } else {
            Backpressure::Congested(self.send_failures)
        }
    }

    pub fn added_event(&self) -> ClientEvent {
        ClientEvent::Added {
            socket: self.socket.raw(),
            addr: self.peer,
        }
    }

    pub fn removed_event(&self) -> ClientEvent {
        ClientEvent::Removed {
            socket: self.socket.raw(),
            addr: self.peer,
        }
    }
}
