//! Fan-out server sender
//!
//! Listens on the configured URI and sends every buffer to all connected
//! clients. Clients are accepted on a background thread and join the stream
//! at the next buffer, after receiving the stream headers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::protocol::constants::{CANCEL_POLL_INTERVAL_MS, SERVER_SINK_BACKLOG};
use crate::protocol::options::Role;
use crate::registry::{ClientEvent, ClientRegistry};
use crate::session::{Caps, Element, SessionBase, Sink, StreamHeaders};
use crate::stats::StatsSnapshot;
use crate::transport::SharedTransport;

use super::config::ServerConfig;
use super::listener::{spawn_accept_thread, Listener};

struct Running {
    listener: Arc<Listener>,
    registry: Arc<ClientRegistry>,
    stop: Arc<AtomicBool>,
    accept_thread: JoinHandle<()>,
}

/// SRT fan-out server
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use srt_session::server::{ServerConfig, ServerSink};
/// use srt_session::session::{Element, Sink};
/// use srt_session::transport::SharedTransport;
///
/// # fn example(transport: SharedTransport) -> srt_session::error::Result<()> {
/// let config = ServerConfig::new("srt://0.0.0.0:7001")?;
/// let (sink, mut events) = ServerSink::new(transport, config);
///
/// sink.start()?;
/// sink.send(&[0x47; 1316])?;
/// while let Ok(event) = events.try_recv() {
///     println!("{:?}", event);
/// }
/// sink.stop()?;
/// # Ok(())
/// # }
/// ```
pub struct ServerSink {
    base: SessionBase<ServerConfig>,
    transport: SharedTransport,
    events: mpsc::UnboundedSender<ClientEvent>,
    headers: StreamHeaders,
    running: Mutex<Option<Running>>,
}

impl ServerSink {
    /// Create a new server sink
    ///
    /// Returns the sink and a receiver for client membership events.
    pub fn new(
        transport: SharedTransport,
        config: ServerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let sink = Self {
            base: SessionBase::new(config),
            transport,
            events: tx,
            headers: StreamHeaders::new(),
            running: Mutex::new(None),
        };

        (sink, rx)
    }

    /// Settings and lifecycle state
    pub fn settings(&self) -> &SessionBase<ServerConfig> {
        &self.base
    }

    /// Replace the stream headers sent to every new client
    pub fn set_stream_headers(&self, headers: Vec<Bytes>) {
        self.headers.set(headers);
    }

    fn registry(&self) -> Option<Arc<ClientRegistry>> {
        self.running
            .lock()
            .as_ref()
            .map(|running| Arc::clone(&running.registry))
    }

    /// Clients currently receiving the stream
    pub fn live_clients(&self) -> usize {
        self.registry().map_or(0, |r| r.live_count())
    }

    /// Clients accepted but not yet sent anything
    pub fn pending_clients(&self) -> usize {
        self.registry().map_or(0, |r| r.pending_count())
    }
}

impl Element for ServerSink {
    fn start(&self) -> Result<()> {
        if self.running.lock().is_some() {
            return Ok(());
        }

        let config = self.base.config();
        let addr = config.listen_addr()?;
        let backlog = config.backlog.unwrap_or(SERVER_SINK_BACKLOG);
        let profile = config.session.option_profile(Role::Sender);

        let listener = Arc::new(Listener::bind(&self.transport, addr, &profile, backlog)?);
        let registry = Arc::new(ClientRegistry::new(self.events.clone()));
        let stop = Arc::new(AtomicBool::new(false));

        let timeout = Some(
            config
                .session
                .poll_timeout
                .unwrap_or(std::time::Duration::from_millis(CANCEL_POLL_INTERVAL_MS)),
        );

        let accept_thread = match spawn_accept_thread(
            Arc::clone(&listener),
            Arc::clone(&registry),
            Arc::clone(&stop),
            timeout,
        ) {
            Ok(handle) => handle,
            Err(e) => {
                listener.shutdown();
                return Err(Error::ThreadSpawn(e));
            }
        };

        self.base.set_address(Some(addr));
        *self.running.lock() = Some(Running {
            listener,
            registry,
            stop,
            accept_thread,
        });
        self.base.mark_started();

        tracing::info!(uri = %self.base.uri(), "SRT server sender started");
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let Some(running) = self.running.lock().take() else {
            self.base.mark_stopped();
            return Ok(());
        };

        running.stop.store(true, Ordering::Release);
        running.listener.shutdown();

        if running.accept_thread.join().is_err() {
            tracing::warn!("Accept thread panicked");
        }

        let closed = running.registry.shutdown();
        self.base.mark_stopped();

        tracing::info!(uri = %self.base.uri(), clients = closed, "SRT server sender stopped");
        Ok(())
    }

    /// Stops delivery until `unlock_stop`; the accept thread keeps running
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
        StatsSnapshot::PerClient(self.registry().map(|r| r.stats()).unwrap_or_default())
    }
}

impl Sink for ServerSink {
    /// Per-client failures are contained; this only fails when not started
    ///
    /// Buffers handed over between `unlock` and `unlock_stop` are dropped.
    fn send(&self, buffer: &[u8]) -> Result<()> {
        let registry = self.registry().ok_or(Error::NotStarted)?;
        if self.base.is_cancelled() {
            tracing::trace!(size = buffer.len(), "Flushing, buffer dropped");
            return Ok(());
        }

        registry.deliver(buffer, &self.headers);
        Ok(())
    }
}

impl Drop for ServerSink {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
