//! SRT transport contract
//!
//! The session layer drives an existing SRT implementation through the
//! [`Transport`] trait: socket creation, option assignment, bind, listen,
//! accept, connect, message send/receive, epoll-style readiness waits and
//! statistics. Handles returned by the transport are plain integers; the
//! [`SrtSocket`] and [`Poller`] wrappers give them scoped ownership.
//!
//! ```text
//!   ClientSink / ClientSource          ServerSink / ServerSource
//!            │                                   │
//!            ▼                                   ▼
//!     connector::connect()              listener::Listener::bind()
//!            │                                   │
//!            └──────────► SrtSocket / Poller ◄───┘
//!                                │
//!                                ▼
//!                      Arc<dyn Transport>
//! ```

pub mod socket;

#[cfg(test)]
pub mod mock;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::options::SocketOption;

pub use socket::{Poller, SrtSocket};

/// Raw transport socket handle
pub type RawSocket = i32;

/// Raw readiness multiplexer handle
pub type RawPoll = i32;

/// Shared handle to a transport implementation
pub type SharedTransport = Arc<dyn Transport>;

/// Address family of a transport socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Address family of a socket address
    pub fn of(addr: &SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(_) => AddressFamily::Ipv4,
            SocketAddr::V6(_) => AddressFamily::Ipv6,
        }
    }
}

/// Transport-level socket state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Init,
    Opened,
    Listening,
    Connecting,
    Connected,
    Broken,
    Closing,
    Closed,
    NonExist,
}

/// Readiness interest / readiness result flags
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct EpollEvents(u8);

impl EpollEvents {
    pub const IN: EpollEvents = EpollEvents(0x1);
    pub const OUT: EpollEvents = EpollEvents(0x4);
    pub const ERR: EpollEvents = EpollEvents(0x8);

    /// No events
    pub const fn empty() -> Self {
        EpollEvents(0)
    }

    /// Interest used for sending sockets
    pub const fn sender() -> Self {
        EpollEvents(Self::IN.0 | Self::OUT.0 | Self::ERR.0)
    }

    /// Interest used for receiving sockets
    pub const fn receiver() -> Self {
        EpollEvents(Self::IN.0 | Self::ERR.0)
    }

    pub const fn contains(self, other: EpollEvents) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: EpollEvents) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl std::ops::BitOr for EpollEvents {
    type Output = EpollEvents;

    fn bitor(self, rhs: EpollEvents) -> EpollEvents {
        EpollEvents(self.0 | rhs.0)
    }
}

impl fmt::Debug for EpollEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::IN) {
            names.push("IN");
        }
        if self.contains(Self::OUT) {
            names.push("OUT");
        }
        if self.contains(Self::ERR) {
            names.push("ERR");
        }
        write!(f, "EpollEvents({})", names.join("|"))
    }
}

/// A socket reported ready by a multiplexer wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub socket: RawSocket,
    pub events: EpollEvents,
}

/// Per-message control data reported by a receive call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MsgCtrl {
    /// Message number assigned by the sender (0 when unknown)
    pub msg_no: i32,
    /// Source time stamped by the sender, in microseconds
    pub src_time: u64,
}

/// Raw cumulative counters as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransportStats {
    pub pkt_sent: i64,
    pub pkt_recv: i64,
    pub pkt_snd_loss: i32,
    pub pkt_rcv_loss: i32,
    pub pkt_retrans: i32,
    pub pkt_recv_ack: i32,
    pub pkt_recv_nak: i32,
    pub pkt_snd_drop: i32,
    pub pkt_rcv_drop: i32,
    pub us_snd_duration: i64,
    pub byte_sent: u64,
    pub byte_recv: u64,
    pub byte_retrans: u64,
    pub byte_snd_drop: u64,
    pub byte_rcv_loss: u64,
    pub mbps_send_rate: f64,
    pub mbps_recv_rate: f64,
    pub mbps_bandwidth: f64,
    pub ms_rtt: f64,
}

/// Errors reported by the transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// A bounded wait elapsed with nothing ready
    #[error("operation timed out")]
    Timeout,

    /// Socket handle is unknown or already closed
    #[error("invalid socket {0}")]
    InvalidSocket(RawSocket),

    /// Multiplexer handle is unknown or already released
    #[error("invalid poll id {0}")]
    InvalidPoll(RawPoll),

    /// Connection is broken or was closed by the peer
    #[error("connection lost")]
    ConnectionLost,

    /// Any other transport failure
    #[error("SRT error {code}: {message}")]
    Other { code: i32, message: String },
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}

/// Contract of the underlying SRT library
///
/// Implementations must be callable concurrently from the accept thread and
/// the data thread. A wait that is blocked on a multiplexer must return
/// promptly once that multiplexer is released.
pub trait Transport: Send + Sync {
    fn create_socket(&self, family: AddressFamily) -> Result<RawSocket, TransportError>;

    fn set_option(&self, socket: RawSocket, option: &SocketOption) -> Result<(), TransportError>;

    /// Number of bytes sent but not yet acknowledged by the peer
    fn unacked_bytes(&self, socket: RawSocket) -> Result<usize, TransportError>;

    fn bind(&self, socket: RawSocket, addr: SocketAddr) -> Result<(), TransportError>;

    fn listen(&self, socket: RawSocket, backlog: u32) -> Result<(), TransportError>;

    fn accept(&self, socket: RawSocket) -> Result<(RawSocket, SocketAddr), TransportError>;

    fn connect(&self, socket: RawSocket, addr: SocketAddr) -> Result<(), TransportError>;

    fn state(&self, socket: RawSocket) -> SocketState;

    fn send_msg(&self, socket: RawSocket, data: &[u8]) -> Result<usize, TransportError>;

    /// Receive one message. `Ok((0, _))` signals end of stream.
    fn recv_msg(&self, socket: RawSocket, buf: &mut [u8])
        -> Result<(usize, MsgCtrl), TransportError>;

    fn close(&self, socket: RawSocket) -> Result<(), TransportError>;

    fn stats(&self, socket: RawSocket) -> Result<TransportStats, TransportError>;

    fn epoll_create(&self) -> Result<RawPoll, TransportError>;

    fn epoll_add(
        &self,
        poll: RawPoll,
        socket: RawSocket,
        events: EpollEvents,
    ) -> Result<(), TransportError>;

    fn epoll_remove(&self, poll: RawPoll, socket: RawSocket) -> Result<(), TransportError>;

    /// Wait for readiness. `None` waits without a time limit.
    fn epoll_wait(
        &self,
        poll: RawPoll,
        timeout: Option<Duration>,
    ) -> Result<Vec<Readiness>, TransportError>;

    fn epoll_release(&self, poll: RawPoll) -> Result<(), TransportError>;
}
