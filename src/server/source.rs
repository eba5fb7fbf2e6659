//! Single-client server receiver
//!
//! Listens on the configured URI and receives from one client at a time. When
//! that client goes away the listen socket is re-armed and the next `fill`
//! accepts a new one.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::protocol::constants::SERVER_SOURCE_BACKLOG;
use crate::protocol::options::Role;
use crate::registry::ClientEvent;
use crate::session::buffer::receive_message;
use crate::session::{Caps, Element, FillOutcome, SequenceTracker, SessionBase, Source};
use crate::stats::{StatsReport, StatsSnapshot};
use crate::transport::{EpollEvents, SharedTransport, SrtSocket};

use super::config::ServerConfig;
use super::listener::{wait_cancellable, Listener, WaitOutcome};

#[derive(Debug)]
struct Client {
    socket: SrtSocket,
    peer: SocketAddr,
}

/// SRT server receiver
pub struct ServerSource {
    base: SessionBase<ServerConfig>,
    transport: SharedTransport,
    events: mpsc::UnboundedSender<ClientEvent>,
    listener: Mutex<Option<Arc<Listener>>>,
    client: Mutex<Option<Arc<Client>>>,
    sequence: Mutex<SequenceTracker>,
}

impl ServerSource {
    /// Create a new server source
    ///
    /// Returns the source and a receiver for client membership events.
    pub fn new(
        transport: SharedTransport,
        config: ServerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let source = Self {
            base: SessionBase::new(config),
            transport,
            events: tx,
            listener: Mutex::new(None),
            client: Mutex::new(None),
            sequence: Mutex::new(SequenceTracker::new()),
        };

        (source, rx)
    }

    /// Settings and lifecycle state
    pub fn settings(&self) -> &SessionBase<ServerConfig> {
        &self.base
    }

    /// Address of the connected client, if any
    pub fn peer(&self) -> Option<SocketAddr> {
        self.client.lock().as_ref().map(|c| c.peer)
    }

    pub fn last_msg_no(&self) -> Option<i32> {
        self.sequence.lock().last()
    }

    fn listener(&self) -> Option<Arc<Listener>> {
        self.listener.lock().clone()
    }

    fn client(&self) -> Option<Arc<Client>> {
        self.client.lock().clone()
    }

    fn emit(&self, event: ClientEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!(?event, "No event receiver");
        }
    }

    /// Wait for a client and swap it in for the listen socket
    fn accept_client(&self, listener: &Listener) -> Result<Option<FillOutcome>> {
        let wait_timeout = self.base.config().wait_timeout;
        let deadline = wait_timeout.map(|t| Instant::now() + t);
        let cancel = self.base.cancel_flag();

        loop {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            let outcome = match remaining {
                Some(left) if left.is_zero() => Ok(WaitOutcome::TimedOut),
                _ => wait_cancellable(listener.poller(), remaining, &cancel),
            };

            match outcome {
                Ok(WaitOutcome::Ready) => {}
                Ok(WaitOutcome::TimedOut) => {
                    tracing::warn!(
                        addr = %listener.address(),
                        timeout = ?wait_timeout,
                        "Timed out waiting for an SRT client"
                    );
                    return Ok(Some(FillOutcome::Eos));
                }
                Ok(WaitOutcome::Cancelled) => return Ok(Some(FillOutcome::Flushing)),
                Err(e) => return Err(Error::Read(e)),
            }

            let (socket, peer) = match listener.accept() {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept SRT client");
                    continue;
                }
            };

            // Listen socket stays armed until the client is registered
            if let Err(e) = listener.poller().add(&socket, EpollEvents::receiver()) {
                tracing::warn!(addr = %peer, error = %e, "Failed to register SRT client");
                return Err(Error::Transport(e));
            }
            listener.poller().remove(listener.socket());

            tracing::info!(socket = socket.raw(), addr = %peer, "SRT client connected");
            self.emit(ClientEvent::Added {
                socket: socket.raw(),
                addr: peer,
            });

            self.sequence.lock().reset();
            *self.client.lock() = Some(Arc::new(Client { socket, peer }));
            return Ok(None);
        }
    }

    /// Close the current client and re-arm the listen socket
    fn drop_client(&self, listener: &Listener) -> Result<()> {
        self.close_client();
        listener
            .poller()
            .add(listener.socket(), EpollEvents::receiver())
            .map_err(Error::Transport)
    }

    fn close_client(&self) {
        let Some(client) = self.client.lock().take() else {
            return;
        };

        let raw = client.socket.raw();
        if let Some(listener) = self.listener() {
            listener.poller().remove(&client.socket);
        }
        client.socket.close();

        tracing::info!(socket = raw, addr = %client.peer, "SRT client disconnected");
        self.emit(ClientEvent::Removed {
            socket: raw,
            addr: client.peer,
        });
    }
}

impl Element for ServerSource {
    fn start(&self) -> Result<()> {
        if self.listener.lock().is_some() {
            return Ok(());
        }

        let config = self.base.config();
        let addr = config.listen_addr()?;
        let backlog = config.backlog.unwrap_or(SERVER_SOURCE_BACKLOG);
        let profile = config.session.option_profile(Role::Receiver);

        let listener = Listener::bind(&self.transport, addr, &profile, backlog)?;

        self.base.set_address(Some(addr));
        *self.listener.lock() = Some(Arc::new(listener));
        self.base.mark_started();

        tracing::info!(uri = %self.base.uri(), "SRT server receiver started");
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.close_client();

        if let Some(listener) = self.listener.lock().take() {
            listener.shutdown();
        }

        if self.base.mark_stopped() {
            tracing::info!(uri = %self.base.uri(), "SRT server receiver stopped");
        }
        Ok(())
    }

    fn unlock(&self) {
        self.base.cancel();
    }

    fn unlock_stop(&self) {
        self.base.clear_cancel();
    }

    fn caps(&self, filter: Option<&Caps>) -> Caps {
        self.base.caps(filter)
    }

    fn stats(&self) -> StatsSnapshot {
        let client = self.client();
        StatsSnapshot::Single(StatsReport::receiver(
            client.as_ref().map(|c| &c.socket),
            client.as_ref().map(|c| c.peer),
        ))
    }
}

impl Source for ServerSource {
    fn fill(&self, buffer: &mut BytesMut) -> Result<FillOutcome> {
        let listener = self.listener().ok_or(Error::NotStarted)?;
        if self.base.is_cancelled() {
            return Ok(FillOutcome::Flushing);
        }

        let client = match self.client() {
            Some(client) => client,
            None => {
                if let Some(outcome) = self.accept_client(&listener)? {
                    return Ok(outcome);
                }
                self.client().ok_or(Error::NotStarted)?
            }
        };

        let cancel = self.base.cancel_flag();
        match wait_cancellable(listener.poller(), self.base.poll_timeout(), &cancel) {
            Ok(WaitOutcome::Ready) => {}
            Ok(WaitOutcome::TimedOut) => return Ok(FillOutcome::NoData),
            Ok(WaitOutcome::Cancelled) => return Ok(FillOutcome::Flushing),
            Err(e) => return Err(Error::Read(e)),
        }

        let mut sequence = self.sequence.lock();
        let received = receive_message(&client.socket, buffer, &mut sequence, || {
            self.base.running_time()
        });
        drop(sequence);

        match received {
            Ok(Some(meta)) => Ok(FillOutcome::Filled(meta)),
            Ok(None) => {
                tracing::info!(socket = client.socket.raw(), "SRT client ended the stream");
                Ok(FillOutcome::Eos)
            }
            Err(_) if self.base.is_cancelled() => Ok(FillOutcome::Flushing),
            Err(e) => {
                tracing::warn!(
                    socket = client.socket.raw(),
                    addr = %client.peer,
                    error = %e,
                    "SRT client receive failed"
                );
                self.drop_client(&listener)?;
                Ok(FillOutcome::NoData)
            }
        }
    }
}

impl Drop for ServerSource {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::session::SessionConfig;
    use crate::transport::mock::{init_tracing, Faults, MockTransport};

    fn peer(i: u8) -> SocketAddr {
        format!("10.1.1.{}:5000", i).parse().unwrap()
    }

    fn server(
        mock: &Arc<MockTransport>,
        wait_timeout: Option<Duration>,
    ) -> (ServerSource, mpsc::UnboundedReceiver<ClientEvent>) {
        init_tracing();
        let transport: SharedTransport = mock.clone();
        let session = SessionConfig::with_uri("srt://0.0.0.0:7001")
            .unwrap()
            .poll_timeout(Some(Duration::from_millis(50)));
        let mut config = ServerConfig::with_session(session);
        config.wait_timeout = wait_timeout;
        ServerSource::new(transport, config)
    }

    #[test]
    fn test_accept_then_receive() {
        let mock = Arc::new(MockTransport::new());
        let (source, mut events) = server(&mock, None);
        source.start().unwrap();

        mock.connect_client(peer(1));
        let mut buffer = BytesMut::new();
        assert_eq!(source.fill(&mut buffer).unwrap(), FillOutcome::NoData);
        assert_eq!(source.peer(), Some(peer(1)));

        mock.push_message(peer(1), b"payload", 3, 9_000);
        let outcome = source.fill(&mut buffer).unwrap();
        let FillOutcome::Filled(meta) = outcome else {
            panic!("expected a filled buffer, got {:?}", outcome);
        };
        assert_eq!(&buffer[..], b"payload");
        assert_eq!(meta.msg_no, Some(3));
        assert_eq!(source.last_msg_no(), Some(3));

        let event = events.try_recv().unwrap();
        assert!(event.is_added());
        assert_eq!(event.addr(), peer(1));
    }

    #[test]
    fn test_wait_timeout_is_eos() {
        let mock = Arc::new(MockTransport::new());
        let (source, _events) = server(&mock, Some(Duration::from_millis(30)));
        source.start().unwrap();

        let mut buffer = BytesMut::new();
        assert_eq!(source.fill(&mut buffer).unwrap(), FillOutcome::Eos);
    }

    #[test]
    fn test_receive_error_reaccepts() {
        let mock = Arc::new(MockTransport::new());
        let (source, mut events) = server(&mock, None);
        source.start().unwrap();

        mock.connect_client(peer(1));
        let mut buffer = BytesMut::new();
        source.fill(&mut buffer).unwrap();

        mock.push_error(peer(1));
        assert_eq!(source.fill(&mut buffer).unwrap(), FillOutcome::NoData);
        assert_eq!(source.peer(), None);

        mock.connect_client(peer(2));
        source.fill(&mut buffer).unwrap();
        assert_eq!(source.peer(), Some(peer(2)));

        mock.push_message(peer(2), b"again", 1, 0);
        assert!(matches!(
            source.fill(&mut buffer).unwrap(),
            FillOutcome::Filled(_)
        ));

        let seen: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
        assert_eq!(seen.len(), 3);
        assert!(seen[0].is_added());
        assert_eq!(seen[1], ClientEvent::Removed {
            socket: seen[0].socket(),
            addr: peer(1),
        });
        assert!(seen[2].is_added());
        assert_eq!(seen[2].addr(), peer(2));
    }

    #[test]
    fn test_register_failure_keeps_listening() {
        let mock = Arc::new(MockTransport::new());
        let (source, mut events) = server(&mock, Some(Duration::from_secs(2)));
        source.start().unwrap();

        mock.set_faults(Faults {
            epoll_add: true,
            ..Default::default()
        });
        mock.connect_client(peer(1));
        let mut buffer = BytesMut::new();
        assert!(matches!(source.fill(&mut buffer), Err(Error::Transport(_))));
        assert_eq!(source.peer(), None);
        assert!(events.try_recv().is_err());

        mock.set_faults(Faults::default());
        mock.connect_client(peer(2));
        assert_eq!(source.fill(&mut buffer).unwrap(), FillOutcome::NoData);
        assert_eq!(source.peer(), Some(peer(2)));
        assert_eq!(events.try_recv().unwrap().addr(), peer(2));

        source.stop().unwrap();
        assert_eq!(mock.open_sockets(), 0);
    }

    #[test]
    fn test_end_of_stream() {
        let mock = Arc::new(MockTransport::new());
        let (source, _events) = server(&mock, None);
        source.start().unwrap();

        mock.connect_client(peer(1));
        let mut buffer = BytesMut::new();
        source.fill(&mut buffer).unwrap();

        mock.end_of_stream(peer(1));
        assert_eq!(source.fill(&mut buffer).unwrap(), FillOutcome::Eos);
    }

    #[test]
    fn test_accept_failure_keeps_waiting() {
        let mock = Arc::new(MockTransport::with_faults(Faults {
            accept: true,
            ..Default::default()
        }));
        let (source, _events) = server(&mock, Some(Duration::from_millis(40)));
        source.start().unwrap();

        mock.connect_client(peer(1));
        let mut buffer = BytesMut::new();
        assert_eq!(source.fill(&mut buffer).unwrap(), FillOutcome::Eos);
        assert_eq!(source.peer(), None);
    }

    #[test]
    fn test_unlock_interrupts_wait_for_client() {
        let mock = Arc::new(MockTransport::new());
        let (source, _events) = server(&mock, None);
        source.start().unwrap();

        std::thread::scope(|s| {
            let filler = s.spawn(|| {
                let mut buffer = BytesMut::new();
                source.fill(&mut buffer)
            });

            std::thread::sleep(Duration::from_millis(20));
            source.unlock();

            assert_eq!(filler.join().unwrap().unwrap(), FillOutcome::Flushing);
        });

        source.unlock_stop();
        source.stop().unwrap();
        assert_eq!(mock.open_sockets(), 0);
        assert_eq!(mock.open_polls(), 0);
    }

    #[test]
    fn test_stop_closes_client() {
        let mock = Arc::new(MockTransport::new());
        let (source, mut events) = server(&mock, None);
        source.start().unwrap();

        mock.connect_client(peer(1));
        let mut buffer = BytesMut::new();
        source.fill(&mut buffer).unwrap();
        let added = events.try_recv().unwrap();

        source.stop().unwrap();
        source.stop().unwrap();

        assert_eq!(events.try_recv().unwrap(), ClientEvent::Removed {
            socket: added.socket(),
            addr: peer(1),
        });
        assert!(events.try_recv().is_err());
        assert_eq!(mock.open_sockets(), 0);
        assert_eq!(mock.open_polls(), 0);
        assert!(!source.settings().is_started());
    }

    #[test]
    fn test_stats_follow_client() {
        let mock = Arc::new(MockTransport::new());
        let (source, _events) = server(&mock, None);
        source.start().unwrap();
        assert!(source.stats().reports()[0].is_empty());

        mock.connect_client(peer(1));
        let mut buffer = BytesMut::new();
        source.fill(&mut buffer).unwrap();
        mock.push_message(peer(1), &[1u8; 64], 1, 0);
        source.fill(&mut buffer).unwrap();

        let snapshot = source.stats();
        let report = &snapshot.reports()[0];
        assert_eq!(report.address, Some(peer(1)));
        assert_eq!(report.receiver_stats().map(|s| s.bytes_received), Some(64));
    }

    #[test]
    fn test_fill_before_start() {
        let mock = Arc::new(MockTransport::new());
        let (source, _events) = server(&mock, None);

        let mut buffer = BytesMut::new();
        assert!(matches!(source.fill(&mut buffer), Err(Error::NotStarted)));
        assert_eq!(mock.sockets_opened(), 0);
    }
}
