//! Client sender
//!
//! Connects to a remote SRT listener on `start` and sends every buffer it is
//! handed. Stream headers go out once, ahead of the first buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::protocol::options::Role;
use crate::session::{Caps, Element, SessionBase, Sink, StreamHeaders};
use crate::stats::{StatsReport, StatsSnapshot};
use crate::transport::SharedTransport;

use super::config::ClientConfig;
use super::connector::{self, Connection};

/// SRT client sender
pub struct ClientSink {
    base: SessionBase<ClientConfig>,
    transport: SharedTransport,
    connection: Mutex<Option<Arc<Connection>>>,
    headers: StreamHeaders,
    headers_sent: AtomicBool,
}

impl ClientSink {
    pub fn new(transport: SharedTransport, config: ClientConfig) -> Self {
        Self {
            base: SessionBase::new(config),
            transport,
            connection: Mutex::new(None),
            headers: StreamHeaders::new(),
            headers_sent: AtomicBool::new(false),
        }
    }

    /// Settings and lifecycle state
    pub fn settings(&self) -> &SessionBase<ClientConfig> {
        &self.base
    }

    /// Replace the stream headers sent ahead of the first buffer
    pub fn set_stream_headers(&self, headers: Vec<Bytes>) {
        self.headers.set(headers);
    }

    fn connection(&self) -> Option<Arc<Connection>> {
        self.connection.lock().clone()
    }
}

impl Element for ClientSink {
    fn start(&self) -> Result<()> {
        if self.connection.lock().is_some() {
            return Ok(());
        }

        let request = self.base.config().connect_request(Role::Sender)?;
        let connection = connector::connect(&self.transport, &request)?;

        self.base.set_address(Some(connection.address));
        *self.connection.lock() = Some(Arc::new(connection));
        self.headers_sent.store(false, Ordering::Release);
        self.base.mark_started();

        tracing::info!(uri = %self.base.uri(), "SRT client sender started");
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if let Some(connection) = self.connection.lock().take() {
            connection.shutdown();
        }
        self.headers_sent.store(false, Ordering::Release);

        if self.base.mark_stopped() {
            tracing::info!(uri = %self.base.uri(), "SRT client sender stopped");
        }
        Ok(())
    }

    fn unlock(&self) {
        self.base.cancel();
        if let Some(connection) = self.connection() {
            connection.shutdown();
        }
    }

    fn unlock_stop(&self) {
        self.base.clear_cancel();
    }

    fn caps(&self, filter: Option<&Caps>) -> Caps {
        self.base.caps(filter)
    }

    fn stats(&self) -> StatsSnapshot {
        let connection = self.connection();
        StatsSnapshot::Single(StatsReport::sender(
            connection.as_ref().map(|c| &c.socket),
            self.base.address(),
        ))
    }
}

impl Sink for ClientSink {
    fn send(&self, buffer: &[u8]) -> Result<()> {
        let connection = self.connection().ok_or(Error::NotStarted)?;
        let socket = &connection.socket;

        if !self.headers_sent.load(Ordering::Acquire) {
            let count = self
                .headers
                .send_all(|header| socket.send(header))
                .map_err(Error::Write)?;
            self.headers_sent.store(true, Ordering::Release);
            tracing::debug!(socket = socket.raw(), headers = count, "Sent stream headers");
        }

        socket.send(buffer).map_err(Error::Write)?;
        tracing::trace!(socket = socket.raw(), size = buffer.len(), "Sent buffer");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use super::*;
    use crate::error::ConnectError;
    use crate::transport::mock::{init_tracing, Faults, MockTransport};

    fn peer() -> SocketAddr {
        "127.0.0.1:7001".parse().unwrap()
    }

    fn sink(mock: &Arc<MockTransport>) -> ClientSink {
        init_tracing();
        let transport: SharedTransport = mock.clone();
        ClientSink::new(transport, ClientConfig::default())
    }

    #[test]
    fn test_headers_sent_once() {
        let mock = Arc::new(MockTransport::new());
        let sink = sink(&mock);
        sink.set_stream_headers(vec![Bytes::from_static(b"hdr")]);

        sink.start().unwrap();
        sink.send(b"one").unwrap();
        sink.send(b"two").unwrap();

        assert_eq!(
            mock.sent_to(peer()),
            vec![b"hdr".to_vec(), b"one".to_vec(), b"two".to_vec()]
        );
    }

    #[test]
    fn test_send_before_start() {
        let mock = Arc::new(MockTransport::new());
        let sink = sink(&mock);

        assert!(matches!(sink.send(b"data"), Err(Error::NotStarted)));
    }

    #[test]
    fn test_send_failure_is_write_error() {
        let mock = Arc::new(MockTransport::new());
        let sink = sink(&mock);

        sink.start().unwrap();
        mock.fail_sends_to(peer());

        assert!(matches!(sink.send(b"data"), Err(Error::Write(_))));
    }

    #[test]
    fn test_failed_start_leaks_nothing() {
        let mock = Arc::new(MockTransport::with_faults(Faults {
            connect: true,
            ..Default::default()
        }));
        let sink = sink(&mock);

        assert!(matches!(
            sink.start(),
            Err(Error::Connect(ConnectError::Connect { .. }))
        ));
        assert!(!sink.settings().is_started());
        assert_eq!(mock.open_sockets(), 0);
        assert_eq!(mock.open_polls(), 0);
    }

    #[test]
    fn test_stop_releases_handles() {
        let mock = Arc::new(MockTransport::new());
        let sink = sink(&mock);

        sink.start().unwrap();
        sink.unlock();
        sink.unlock();
        sink.stop().unwrap();
        sink.stop().unwrap();

        assert_eq!(mock.sockets_opened(), 1);
        assert_eq!(mock.close_calls(), 1);
        assert_eq!(mock.open_polls(), 0);
    }

    #[test]
    fn test_stats_after_send() {
        let mock = Arc::new(MockTransport::new());
        let sink = sink(&mock);

        assert!(sink.stats().reports()[0].is_empty());

        sink.start().unwrap();
        sink.send(&[0u8; 188]).unwrap();

        let snapshot = sink.stats();
        let report = &snapshot.reports()[0];
        assert_eq!(report.address, Some(peer()));
        assert_eq!(report.sender_stats().map(|s| s.packets_sent), Some(1));
        assert_eq!(report.sender_stats().map(|s| s.bytes_sent), Some(188));
    }

    #[test]
    fn test_uri_locked_while_started() {
        let mock = Arc::new(MockTransport::new());
        let sink = sink(&mock);

        sink.start().unwrap();
        assert!(sink.settings().set_uri("srt://10.0.0.1:9000").is_err());

        sink.stop().unwrap();
        sink.settings().set_uri("srt://10.0.0.1:9000").unwrap();
    }
}
