//! SRT server listener
//!
//! Binds the listen socket and runs the accept loop of the fan-out server on
//! a dedicated thread.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::ConnectError;
use crate::protocol::constants::CANCEL_POLL_INTERVAL_MS;
use crate::protocol::options::OptionProfile;
use crate::registry::ClientRegistry;
use crate::transport::{
    AddressFamily, EpollEvents, Poller, SharedTransport, SrtSocket, TransportError,
};

/// Name of the accept thread
pub const ACCEPT_THREAD_NAME: &str = "srt-accept";

/// Result of a cancellable readiness wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    TimedOut,
    Cancelled,
}

/// Wait on `poller` in short slices so `cancel` is noticed promptly
///
/// `timeout` bounds the whole wait; `None` waits until ready or cancelled.
pub fn wait_cancellable(
    poller: &Poller,
    timeout: Option<Duration>,
    cancel: &AtomicBool,
) -> Result<WaitOutcome, TransportError> {
    let slice = Duration::from_millis(CANCEL_POLL_INTERVAL_MS);
    let deadline = timeout.map(|t| Instant::now() + t);

    loop {
        if cancel.load(Ordering::Acquire) {
            return Ok(WaitOutcome::Cancelled);
        }

        let wait = match deadline {
            Some(deadline) => slice.min(deadline.saturating_duration_since(Instant::now())),
            None => slice,
        };

        match poller.wait(Some(wait)) {
            Ok(_) => return Ok(WaitOutcome::Ready),
            Err(e) if e.is_timeout() => {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    return Ok(WaitOutcome::TimedOut);
                }
            }
            Err(_) if cancel.load(Ordering::Acquire) => return Ok(WaitOutcome::Cancelled),
            Err(e) => return Err(e),
        }
    }
}

/// Bound and listening server socket with its multiplexer
#[derive(Debug)]
pub struct Listener {
    socket: SrtSocket,
    poller: Poller,
    address: SocketAddr,
}

impl Listener {
    /// Bind `addr` and start listening
    ///
    /// The listen socket is registered for incoming connections only.
    pub fn bind(
        transport: &SharedTransport,
        addr: SocketAddr,
        profile: &OptionProfile,
        backlog: u32,
    ) -> Result<Self, ConnectError> {
        let poller = Poller::create(transport).map_err(ConnectError::MultiplexerInit)?;

        let socket = SrtSocket::create(transport, AddressFamily::of(&addr))
            .map_err(ConnectError::SocketCreate)?;
        socket.apply_options(&profile.options());

        socket.bind(addr).map_err(|e| ConnectError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

        socket.listen(backlog).map_err(ConnectError::Listen)?;

        poller
            .add(&socket, EpollEvents::receiver())
            .map_err(ConnectError::Register)?;

        tracing::info!(addr = %addr, socket = socket.raw(), backlog, "SRT server listening");

        Ok(Self {
            socket,
            poller,
            address: addr,
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn socket(&self) -> &SrtSocket {
        &self.socket
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    pub fn accept(&self) -> Result<(SrtSocket, SocketAddr), TransportError> {
        self.socket.accept()
    }

    /// Deregister, release the multiplexer and close the listen socket
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        self.poller.remove(&self.socket);
        self.poller.release();
        if self.socket.close() {
            tracing::debug!(addr = %self.address, "SRT listen socket closed");
        }
    }
}

/// Accept clients into `registry` until `stop` is set
pub fn run_accept_loop(
    listener: &Listener,
    registry: &ClientRegistry,
    stop: &AtomicBool,
    timeout: Option<Duration>,
) {
    tracing::debug!(addr = %listener.address(), "Accept loop started");

    while !stop.load(Ordering::Acquire) {
        match wait_cancellable(listener.poller(), timeout, stop) {
            Ok(WaitOutcome::Ready) => {}
            Ok(WaitOutcome::TimedOut) => continue,
            Ok(WaitOutcome::Cancelled) => break,
            Err(e) => {
                tracing::warn!(error = %e, "SRT epoll wait failed");
                continue;
            }
        }

        match listener.accept() {
            Ok((socket, peer)) => registry.admit(socket, peer),
            Err(e) => {
                tracing::warn!(error = %e, "Detected invalid SRT client socket");
            }
        }
    }

    tracing::info!(addr = %listener.address(), "Accept loop exited");
}

/// Spawn the accept loop on its own thread
pub fn spawn_accept_thread(
    listener: Arc<Listener>,
    registry: Arc<ClientRegistry>,
    stop: Arc<AtomicBool>,
    timeout: Option<Duration>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(ACCEPT_THREAD_NAME.into())
        .spawn(move || run_accept_loop(&listener, &registry, &stop, timeout))
}
