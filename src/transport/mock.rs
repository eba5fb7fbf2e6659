//! In-memory transport for tests
//!
//! Tracks every socket and multiplexer handle it hands out so tests can check
//! that opens and closes balance, and lets tests inject failures at each step
//! of connection setup, simulate incoming connections and messages, and force
//! per-peer send failures or backpressure.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::protocol::options::SocketOption;

use super::{
    AddressFamily, EpollEvents, MsgCtrl, RawPoll, RawSocket, Readiness, SocketState, Transport,
    TransportError, TransportStats,
};

/// Failure injection points
#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub epoll_create: bool,
    pub socket_create: bool,
    pub bind: bool,
    pub listen: bool,
    pub connect: bool,
    /// State reported after a successful connect (default `Connected`)
    pub connect_state: Option<SocketState>,
    pub accept: bool,
    pub epoll_add: bool,
    /// Options the transport refuses
    pub reject_options: bool,
}

#[derive(Debug, Clone, Default)]
struct PeerFaults {
    fail_send: bool,
    unacked: usize,
}

#[derive(Debug)]
enum Inbound {
    Message(Vec<u8>, MsgCtrl),
    Error,
}

#[derive(Debug)]
struct MockSocket {
    state: SocketState,
    peer: Option<SocketAddr>,
    bound: Option<SocketAddr>,
    options: Vec<SocketOption>,
    incoming: VecDeque<SocketAddr>,
    inbox: VecDeque<Inbound>,
    eof: bool,
    sent: Vec<Vec<u8>>,
    stats: TransportStats,
}

impl MockSocket {
    fn new(state: SocketState) -> Self {
        Self {
            state,
            peer: None,
            bound: None,
            options: Vec::new(),
            incoming: VecDeque::new(),
            inbox: VecDeque::new(),
            eof: false,
            sent: Vec::new(),
            stats: TransportStats::default(),
        }
    }

    fn is_open(&self) -> bool {
        self.state != SocketState::Closed
    }

    fn readiness(&self) -> EpollEvents {
        let mut events = EpollEvents::empty();
        if !self.is_open() {
            return events;
        }
        if !self.incoming.is_empty() || !self.inbox.is_empty() || self.eof {
            events = events | EpollEvents::IN;
        }
        if self.state == SocketState::Connected {
            events = events | EpollEvents::OUT;
        }
        if self.state == SocketState::Broken {
            events = events | EpollEvents::ERR;
        }
        events
    }
}

#[derive(Debug, Default)]
struct MockPoll {
    released: bool,
    sockets: HashMap<RawSocket, EpollEvents>,
}

#[derive(Debug, Default)]
struct MockState {
    next_socket: RawSocket,
    next_poll: RawPoll,
    sockets: HashMap<RawSocket, MockSocket>,
    polls: HashMap<RawPoll, MockPoll>,
    faults: Faults,
    peers: HashMap<SocketAddr, PeerFaults>,
    sockets_opened: usize,
    sockets_closed: usize,
    close_calls: usize,
    polls_created: usize,
    polls_released: usize,
}

impl MockState {
    fn socket(&self, socket: RawSocket) -> Result<&MockSocket, TransportError> {
        self.sockets
            .get(&socket)
            .filter(|s| s.is_open())
            .ok_or(TransportError::InvalidSocket(socket))
    }

    fn socket_mut(&mut self, socket: RawSocket) -> Result<&mut MockSocket, TransportError> {
        self.sockets
            .get_mut(&socket)
            .filter(|s| s.is_open())
            .ok_or(TransportError::InvalidSocket(socket))
    }

    fn open_socket(&mut self, socket: MockSocket) -> RawSocket {
        self.next_socket += 1;
        let id = self.next_socket;
        self.sockets.insert(id, socket);
        self.sockets_opened += 1;
        id
    }

    fn socket_for_peer(&mut self, peer: SocketAddr) -> Option<&mut MockSocket> {
        self.sockets
            .values_mut()
            .filter(|s| s.is_open() && s.peer == Some(peer))
            .last()
    }

    fn peer_faults(&self, socket: RawSocket) -> PeerFaults {
        self.sockets
            .get(&socket)
            .and_then(|s| s.peer)
            .and_then(|peer| self.peers.get(&peer))
            .cloned()
            .unwrap_or_default()
    }
}

fn other(message: &str) -> TransportError {
    TransportError::Other {
        code: -1,
        message: message.to_string(),
    }
}

/// Test double for the SRT library
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
    changed: Condvar,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Faults) -> Self {
        let mock = Self::new();
        mock.set_faults(faults);
        mock
    }

    pub fn set_faults(&self, faults: Faults) {
        self.state.lock().faults = faults;
    }

    /// Queue an incoming connection from `peer` on the listening socket
    pub fn connect_client(&self, peer: SocketAddr) -> bool {
        let mut state = self.state.lock();
        let listener = state
            .sockets
            .values_mut()
            .find(|s| s.state == SocketState::Listening);

        match listener {
            Some(listener) => {
                listener.incoming.push_back(peer);
                self.changed.notify_all();
                true
            }
            None => false,
        }
    }

    /// Queue a message on the socket connected to `peer`
    pub fn push_message(&self, peer: SocketAddr, data: &[u8], msg_no: i32, src_time: u64) -> bool {
        let mut state = self.state.lock();
        match state.socket_for_peer(peer) {
            Some(socket) => {
                socket
                    .inbox
                    .push_back(Inbound::Message(data.to_vec(), MsgCtrl { msg_no, src_time }));
                self.changed.notify_all();
                true
            }
            None => false,
        }
    }

    /// Make the next receive from `peer` fail
    pub fn push_error(&self, peer: SocketAddr) -> bool {
        let mut state = self.state.lock();
        match state.socket_for_peer(peer) {
            Some(socket) => {
                socket.inbox.push_back(Inbound::Error);
                self.changed.notify_all();
                true
            }
            None => false,
        }
    }

    /// Signal end of stream on the socket connected to `peer`
    pub fn end_of_stream(&self, peer: SocketAddr) -> bool {
        let mut state = self.state.lock();
        match state.socket_for_peer(peer) {
            Some(socket) => {
                socket.eof = true;
                self.changed.notify_all();
                true
            }
            None => false,
        }
    }

    /// Make every send to `peer` fail
    pub fn fail_sends_to(&self, peer: SocketAddr) {
        self.state.lock().peers.entry(peer).or_default().fail_send = true;
    }

    /// Report `bytes` of unacknowledged data for sockets connected to `peer`
    pub fn set_unacked(&self, peer: SocketAddr, bytes: usize) {
        self.state.lock().peers.entry(peer).or_default().unacked = bytes;
    }

    /// Payloads sent on the most recent socket connected to `peer`
    pub fn sent_to(&self, peer: SocketAddr) -> Vec<Vec<u8>> {
        let state = self.state.lock();
        state
            .sockets
            .values()
            .filter(|s| s.peer == Some(peer))
            .last()
            .map(|s| s.sent.clone())
            .unwrap_or_default()
    }

    /// Options applied to a socket, in order
    pub fn options_of(&self, socket: RawSocket) -> Vec<SocketOption> {
        let state = self.state.lock();
        state
            .sockets
            .get(&socket)
            .map(|s| s.options.clone())
            .unwrap_or_default()
    }

    pub fn bound_addr(&self, socket: RawSocket) -> Option<SocketAddr> {
        self.state.lock().sockets.get(&socket).and_then(|s| s.bound)
    }

    pub fn is_open(&self, socket: RawSocket) -> bool {
        let state = self.state.lock();
        state.sockets.get(&socket).is_some_and(|s| s.is_open())
    }

    /// Sockets currently registered with a multiplexer
    pub fn registered(&self, poll: RawPoll) -> HashMap<RawSocket, EpollEvents> {
        let state = self.state.lock();
        state
            .polls
            .get(&poll)
            .map(|p| p.sockets.clone())
            .unwrap_or_default()
    }

    pub fn sockets_opened(&self) -> usize {
        self.state.lock().sockets_opened
    }

    pub fn sockets_closed(&self) -> usize {
        self.state.lock().sockets_closed
    }

    pub fn open_sockets(&self) -> usize {
        let state = self.state.lock();
        state.sockets_opened - state.sockets_closed
    }

    pub fn close_calls(&self) -> usize {
        self.state.lock().close_calls
    }

    pub fn polls_created(&self) -> usize {
        self.state.lock().polls_created
    }

    pub fn polls_released(&self) -> usize {
        self.state.lock().polls_released
    }

    pub fn open_polls(&self) -> usize {
        let state = self.state.lock();
        state.polls_created - state.polls_released
    }
}

impl Transport for MockTransport {
    fn create_socket(&self, _family: AddressFamily) -> Result<RawSocket, TransportError> {
        let mut state = self.state.lock();
        if state.faults.socket_create {
            return Err(other("socket creation refused"));
        }
        Ok(state.open_socket(MockSocket::new(SocketState::Init)))
    }

    fn set_option(&self, socket: RawSocket, option: &SocketOption) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.faults.reject_options {
            return Err(other("option rejected"));
        }
        state.socket_mut(socket)?.options.push(option.clone());
        Ok(())
    }

    fn unacked_bytes(&self, socket: RawSocket) -> Result<usize, TransportError> {
        let state = self.state.lock();
        state.socket(socket)?;
        Ok(state.peer_faults(socket).unacked)
    }

    fn bind(&self, socket: RawSocket, addr: SocketAddr) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.faults.bind {
            return Err(other("address in use"));
        }
        let socket = state.socket_mut(socket)?;
        socket.bound = Some(addr);
        socket.state = SocketState::Opened;
        Ok(())
    }

    fn listen(&self, socket: RawSocket, _backlog: u32) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.faults.listen {
            return Err(other("listen refused"));
        }
        state.socket_mut(socket)?.state = SocketState::Listening;
        Ok(())
    }

    fn accept(&self, socket: RawSocket) -> Result<(RawSocket, SocketAddr), TransportError> {
        let mut state = self.state.lock();
        if state.faults.accept {
            return Err(other("accept failed"));
        }
        let peer = state
            .socket_mut(socket)?
            .incoming
            .pop_front()
            .ok_or_else(|| other("no pending connection"))?;

        let mut accepted = MockSocket::new(SocketState::Connected);
        accepted.peer = Some(peer);
        Ok((state.open_socket(accepted), peer))
    }

    fn connect(&self, socket: RawSocket, addr: SocketAddr) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.faults.connect {
            return Err(other("connection setup failure"));
        }
        let connect_state = state.faults.connect_state.unwrap_or(SocketState::Connected);
        let socket = state.socket_mut(socket)?;
        socket.peer = Some(addr);
        socket.state = connect_state;
        Ok(())
    }

    fn state(&self, socket: RawSocket) -> SocketState {
        let state = self.state.lock();
        state
            .sockets
            .get(&socket)
            .map(|s| s.state)
            .unwrap_or(SocketState::NonExist)
    }

    fn send_msg(&self, socket: RawSocket, data: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        state.socket(socket)?;
        if state.peer_faults(socket).fail_send {
            return Err(TransportError::ConnectionLost);
        }
        let socket = state.socket_mut(socket)?;
        socket.sent.push(data.to_vec());
        socket.stats.pkt_sent += 1;
        socket.stats.byte_sent += data.len() as u64;
        Ok(data.len())
    }

    fn recv_msg(
        &self,
        socket: RawSocket,
        buf: &mut [u8],
    ) -> Result<(usize, MsgCtrl), TransportError> {
        let mut state = self.state.lock();
        let socket = state.socket_mut(socket)?;
        match socket.inbox.pop_front() {
            Some(Inbound::Message(data, ctrl)) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                socket.stats.pkt_recv += 1;
                socket.stats.byte_recv += len as u64;
                Ok((len, ctrl))
            }
            Some(Inbound::Error) => {
                socket.state = SocketState::Broken;
                Err(TransportError::ConnectionLost)
            }
            None if socket.eof => Ok((0, MsgCtrl::default())),
            None => Err(other("no data available")),
        }
    }

    fn close(&self, socket: RawSocket) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.close_calls += 1;
        state.socket_mut(socket)?.state = SocketState::Closed;
        state.sockets_closed += 1;
        for poll in state.polls.values_mut() {
            poll.sockets.remove(&socket);
        }
        self.changed.notify_all();
        Ok(())
    }

    fn stats(&self, socket: RawSocket) -> Result<TransportStats, TransportError> {
        let state = self.state.lock();
        Ok(state.socket(socket)?.stats)
    }

    fn epoll_create(&self) -> Result<RawPoll, TransportError> {
        let mut state = self.state.lock();
        if state.faults.epoll_create {
            return Err(other("epoll limit reached"));
        }
        state.next_poll += 1;
        let id = state.next_poll;
        state.polls.insert(id, MockPoll::default());
        state.polls_created += 1;
        Ok(id)
    }

    fn epoll_add(
        &self,
        poll: RawPoll,
        socket: RawSocket,
        events: EpollEvents,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.faults.epoll_add {
            return Err(other("epoll add refused"));
        }
        state.socket(socket)?;
        let entry = state
            .polls
            .get_mut(&poll)
            .filter(|p| !p.released)
            .ok_or(TransportError::InvalidPoll(poll))?;
        entry.sockets.insert(socket, events);
        Ok(())
    }

    fn epoll_remove(&self, poll: RawPoll, socket: RawSocket) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        let entry = state
            .polls
            .get_mut(&poll)
            .filter(|p| !p.released)
            .ok_or(TransportError::InvalidPoll(poll))?;
        entry.sockets.remove(&socket);
        Ok(())
    }

    fn epoll_wait(
        &self,
        poll: RawPoll,
        timeout: Option<Duration>,
    ) -> Result<Vec<Readiness>, TransportError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();

        loop {
            let entry = state
                .polls
                .get(&poll)
                .filter(|p| !p.released)
                .ok_or(TransportError::InvalidPoll(poll))?;

            let ready: Vec<Readiness> = entry
                .sockets
                .iter()
                .filter_map(|(&socket, &interest)| {
                    let events = state.sockets.get(&socket)?.readiness();
                    // Read readiness only; writability alone never wakes a wait
                    let wanted = EpollEvents::IN | EpollEvents::ERR;
                    if interest.intersects(events) && events.intersects(wanted) {
                        Some(Readiness { socket, events })
                    } else {
                        None
                    }
                })
                .collect();

            if !ready.is_empty() {
                return Ok(ready);
            }

            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return Err(TransportError::Timeout);
                    }
                    self.changed.wait_until(&mut state, deadline);
                }
                None => self.changed.wait(&mut state),
            }
        }
    }

    fn epoll_release(&self, poll: RawPoll) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        let entry = state
            .polls
            .get_mut(&poll)
            .filter(|p| !p.released)
            .ok_or(TransportError::InvalidPoll(poll))?;
        entry.released = true;
        entry.sockets.clear();
        state.polls_released += 1;
        self.changed.notify_all();
        Ok(())
    }
}

/// Install a test log subscriber (idempotent)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
