//! Client receiver
//!
//! Connects to a remote SRT listener (optionally from a bound local address
//! or in rendezvous mode) and fills one buffer per received message.

use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::protocol::options::Role;
use crate::session::buffer::receive_message;
use crate::session::{Caps, Element, FillOutcome, SequenceTracker, SessionBase, Source};
use crate::stats::{StatsReport, StatsSnapshot};
use crate::transport::SharedTransport;

use super::config::ClientConfig;
use super::connector::{self, Connection};

/// SRT client receiver
pub struct ClientSource {
    base: SessionBase<ClientConfig>,
    transport: SharedTransport,
    connection: Mutex<Option<Arc<Connection>>>,
    sequence: Mutex<SequenceTracker>,
}

impl ClientSource {
    pub fn new(transport: SharedTransport, config: ClientConfig) -> Self {
        Self {
            base: SessionBase::new(config),
            transport,
            connection: Mutex::new(None),
            sequence: Mutex::new(SequenceTracker::new()),
        }
    }

    /// Settings and lifecycle state
    pub fn settings(&self) -> &SessionBase<ClientConfig> {
        &self.base
    }

    /// Last message number received
    pub fn last_msg_no(&self) -> Option<i32> {
        self.sequence.lock().last()
    }

    fn connection(&self) -> Option<Arc<Connection>> {
        self.connection.lock().clone()
    }
}

impl Element for ClientSource {
    fn start(&self) -> Result<()> {
        if self.connection.lock().is_some() {
            return Ok(());
        }

        let request = self.base.config().connect_request(Role::Receiver)?;
        let connection = connector::connect(&self.transport, &request)?;

        self.base.set_address(Some(connection.address));
        *self.connection.lock() = Some(Arc::new(connection));
        self.sequence.lock().reset();
        self.base.mark_started();

        tracing::info!(uri = %self.base.uri(), "SRT client receiver started");
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if let Some(connection) = self.connection.lock().take() {
            connection.shutdown();
        }

        if self.base.mark_stopped() {
            tracing::info!(uri = %self.base.uri(), "SRT client receiver stopped");
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
        StatsSnapshot::Single(StatsReport::receiver(
            connection.as_ref().map(|c| &c.socket),
            self.base.address(),
        ))
    }
}

impl Source for ClientSource {
    fn fill(&self, buffer: &mut BytesMut) -> Result<FillOutcome> {
        let connection = self.connection().ok_or(Error::NotStarted)?;
        if self.base.is_cancelled() {
            return Ok(FillOutcome::Flushing);
        }

        match connection.poller.wait(self.base.poll_timeout()) {
            Ok(_) => {}
            Err(e) if e.is_timeout() => return Ok(FillOutcome::NoData),
            Err(_) if self.base.is_cancelled() => return Ok(FillOutcome::Flushing),
            Err(e) => return Err(Error::Read(e)),
        }

        let mut sequence = self.sequence.lock();
        match receive_message(&connection.socket, buffer, &mut sequence, || {
            self.base.running_time()
        }) {
            Ok(Some(meta)) => Ok(FillOutcome::Filled(meta)),
            Ok(None) => {
                tracing::info!(socket = connection.socket.raw(), "SRT peer ended the stream");
                Ok(FillOutcome::Eos)
            }
            Err(_) if self.base.is_cancelled() => Ok(FillOutcome::Flushing),
            Err(e) => Err(Error::Read(e)),
        }
    }
}
