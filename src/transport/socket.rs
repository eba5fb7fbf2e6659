//! Scoped transport handles
//!
//! `SrtSocket` and `Poller` own one raw handle each. The handle is closed or
//! released exactly once: either by an explicit `close`/`release` call or when
//! the wrapper is dropped. Every operation after that point fails with
//! `InvalidSocket`/`InvalidPoll` without reaching the transport, so a handle
//! number that the transport later reuses can never be touched through a stale
//! wrapper.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::protocol::options::SocketOption;

use super::{
    AddressFamily, EpollEvents, MsgCtrl, RawPoll, RawSocket, Readiness, SharedTransport,
    SocketState, TransportError, TransportStats,
};

/// Owned transport socket
pub struct SrtSocket {
    transport: SharedTransport,
    raw: RawSocket,
    closed: AtomicBool,
}

impl SrtSocket {
    /// Create a new socket for the given address family
    pub fn create(transport: &SharedTransport, family: AddressFamily) -> Result<Self, TransportError> {
        let raw = transport.create_socket(family)?;
        Ok(Self::from_raw(transport.clone(), raw))
    }

    /// Take ownership of a handle the transport already created (e.g. by accept)
    pub fn from_raw(transport: SharedTransport, raw: RawSocket) -> Self {
        Self {
            transport,
            raw,
            closed: AtomicBool::new(false),
        }
    }

    /// Raw handle number, for logging and events
    pub fn raw(&self) -> RawSocket {
        self.raw
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn handle(&self) -> Result<RawSocket, TransportError> {
        if self.is_closed() {
            Err(TransportError::InvalidSocket(self.raw))
        } else {
            Ok(self.raw)
        }
    }

    pub fn set_option(&self, option: &SocketOption) -> Result<(), TransportError> {
        self.transport.set_option(self.handle()?, option)
    }

    /// Apply a list of options in order
    ///
    /// Rejected options are logged and skipped; the remaining options are
    /// still applied.
    pub fn apply_options(&self, options: &[SocketOption]) {
        for option in options {
            if let Err(e) = self.set_option(option) {
                tracing::warn!(
                    socket = self.raw,
                    option = ?option,
                    error = %e,
                    "Transport rejected socket option"
                );
            }
        }
    }

    pub fn bind(&self, addr: SocketAddr) -> Result<(), TransportError> {
        self.transport.bind(self.handle()?, addr)
    }

    pub fn listen(&self, backlog: u32) -> Result<(), TransportError> {
        self.transport.listen(self.handle()?, backlog)
    }

    /// Accept a pending connection on a listening socket
    pub fn accept(&self) -> Result<(SrtSocket, SocketAddr), TransportError> {
        let (raw, addr) = self.transport.accept(self.handle()?)?;
        Ok((SrtSocket::from_raw(self.transport.clone(), raw), addr))
    }

    pub fn connect(&self, addr: SocketAddr) -> Result<(), TransportError> {
        self.transport.connect(self.handle()?, addr)
    }

    pub fn state(&self) -> SocketState {
        match self.handle() {
            Ok(raw) => self.transport.state(raw),
            Err(_) => SocketState::Closed,
        }
    }

    pub fn send(&self, data: &[u8]) -> Result<usize, TransportError> {
        self.transport.send_msg(self.handle()?, data)
    }

    pub fn recv(&self, buf: &mut [u8]) -> Result<(usize, MsgCtrl), TransportError> {
        self.transport.recv_msg(self.handle()?, buf)
    }

    pub fn unacked_bytes(&self) -> Result<usize, TransportError> {
        self.transport.unacked_bytes(self.handle()?)
    }

    pub fn stats(&self) -> Result<TransportStats, TransportError> {
        self.transport.stats(self.handle()?)
    }

    /// Close the socket
    ///
    /// Returns `true` if this call closed it, `false` if it was already closed.
    /// Transport failures are logged, never returned.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        if let Err(e) = self.transport.close(self.raw) {
            tracing::warn!(socket = self.raw, error = %e, "Failed to close SRT socket");
        } else {
            tracing::trace!(socket = self.raw, "SRT socket closed");
        }
        true
    }
}

impl Drop for SrtSocket {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for SrtSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SrtSocket")
            .field("raw", &self.raw)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Owned readiness multiplexer
pub struct Poller {
    transport: SharedTransport,
    raw: RawPoll,
    released: AtomicBool,
}

impl Poller {
    pub fn create(transport: &SharedTransport) -> Result<Self, TransportError> {
        let raw = transport.epoll_create()?;
        tracing::debug!(poll = raw, "SRT epoll created");
        Ok(Self {
            transport: transport.clone(),
            raw,
            released: AtomicBool::new(false),
        })
    }

    pub fn raw(&self) -> RawPoll {
        self.raw
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn handle(&self) -> Result<RawPoll, TransportError> {
        if self.is_released() {
            Err(TransportError::InvalidPoll(self.raw))
        } else {
            Ok(self.raw)
        }
    }

    /// Register a socket with the given interest
    pub fn add(&self, socket: &SrtSocket, events: EpollEvents) -> Result<(), TransportError> {
        self.transport.epoll_add(self.handle()?, socket.handle()?, events)
    }

    /// Deregister a socket; failures are logged
    pub fn remove(&self, socket: &SrtSocket) {
        let (Ok(poll), Ok(raw)) = (self.handle(), socket.handle()) else {
            return;
        };

        if let Err(e) = self.transport.epoll_remove(poll, raw) {
            tracing::debug!(poll, socket = raw, error = %e, "Failed to remove socket from epoll");
        }
    }

    /// Wait for readiness
    ///
    /// `Err(TransportError::Timeout)` means nothing became ready in time.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<Vec<Readiness>, TransportError> {
        self.transport.epoll_wait(self.handle()?, timeout)
    }

    /// Release the multiplexer
    ///
    /// Returns `true` if this call released it.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }

        if let Err(e) = self.transport.epoll_release(self.raw) {
            tracing::warn!(poll = self.raw, error = %e, "Failed to release SRT epoll");
        } else {
            tracing::trace!(poll = self.raw, "SRT epoll released");
        }
        true
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Poller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("raw", &self.raw)
            .field("released", &self.is_released())
            .finish()
    }
}
