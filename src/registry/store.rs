//! Client registry implementation
//!
//! Holds the clients of a fan-out server. Newly accepted clients wait in the
//! pending queue until the data thread has sent them the stream headers and
//! their first buffer; they are then promoted to the live list.
//!
//! Lock order is live list, then pending queue.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::session::StreamHeaders;
use crate::stats::StatsReport;
use crate::transport::SrtSocket;

use super::arena::Arena;
use super::entry::{Backpressure, ClientRecord};
use super::event::ClientEvent;

/// Result of delivering one buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Live clients the buffer was sent to
    pub sent: usize,
    /// Pending clients promoted to live
    pub promoted: usize,
    /// Clients removed while delivering
    pub removed: usize,
}

/// Registry of connected clients
pub struct ClientRegistry {
    live: Mutex<Arena<ClientRecord>>,
    pending_tx: mpsc::UnboundedSender<ClientRecord>,
    pending_rx: Mutex<mpsc::UnboundedReceiver<ClientRecord>>,
    pending_len: AtomicUsize,
    events: mpsc::UnboundedSender<ClientEvent>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    /// Create a registry reporting membership on `events`
    pub fn new(events: mpsc::UnboundedSender<ClientEvent>) -> Self {
        let (pending_tx, pending_rx) = mpsc::unbounded_channel();

        Self {
            live: Mutex::new(Arena::new()),
            pending_tx,
            pending_rx: Mutex::new(pending_rx),
            pending_len: AtomicUsize::new(0),
            events,
            next_id: AtomicU64::new(1),
        }
    }

    fn emit(&self, event: ClientEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    fn discard(&self, record: ClientRecord) {
        record.socket.close();
        self.emit(record.removed_event());
    }

    /// Register a freshly accepted client as pending
    pub fn admit(&self, socket: SrtSocket, peer: SocketAddr) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = ClientRecord::new(id, socket, peer);

        tracing::info!(id, socket = record.socket.raw(), peer = %peer, "Client connected");
        self.emit(record.added_event());

        self.pending_len.fetch_add(1, Ordering::AcqRel);
        if let Err(mpsc::error::SendError(record)) = self.pending_tx.send(record) {
            self.pending_len.fetch_sub(1, Ordering::AcqRel);
            tracing::debug!(id, peer = %peer, "Registry closed, dropping client");
            self.discard(record);
        }
    }

    /// Send `payload` to every live client, then promote pending clients
    ///
    /// Live clients are checked for backpressure first and evicted after too
    /// many consecutive congested checks; a failed send evicts immediately.
    /// Pending clients get the stream headers followed by `payload`; a client
    /// failing either is dropped without ever becoming live.
    pub fn deliver(&self, payload: &[u8], headers: &StreamHeaders) -> Delivery {
        let mut delivery = Delivery::default();
        let mut live = self.live.lock();

        for key in live.keys() {
            let Some(record) = live.get_mut(key) else {
                continue;
            };

            let evict = match record.check_backpressure() {
                Backpressure::Evict => {
                    tracing::warn!(
                        id = record.id,
                        peer = %record.peer,
                        failures = record.send_failures,
                        "Client send buffer full, evicting"
                    );
                    true
                }
                Backpressure::Congested(_) | Backpressure::Clear => {
                    match record.socket.send(payload) {
                        Ok(_) => {
                            delivery.sent += 1;
                            false
                        }
                        Err(e) => {
                            tracing::warn!(
                                id = record.id,
                                peer = %record.peer,
                                error = %e,
                                "Send to client failed, evicting"
                            );
                            true
                        }
                    }
                }
            };

            if evict {
                if let Some(record) = live.remove(key) {
                    self.discard(record);
                    delivery.removed += 1;
                }
            }
        }

        let mut pending = self.pending_rx.lock();
        while let Ok(record) = pending.try_recv() {
            self.pending_len.fetch_sub(1, Ordering::AcqRel);

            let bootstrap = headers
                .send_all(|header| record.socket.send(header))
                .and_then(|_| record.socket.send(payload));

            match bootstrap {
                Ok(_) => {
                    tracing::debug!(id = record.id, peer = %record.peer, "Client is live");
                    live.push_front(record);
                    delivery.promoted += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        id = record.id,
                        peer = %record.peer,
                        error = %e,
                        "Failed to send stream headers to client"
                    );
                    self.discard(record);
                    delivery.removed += 1;
                }
            }
        }

        tracing::trace!(
            size = payload.len(),
            sent = delivery.sent,
            promoted = delivery.promoted,
            removed = delivery.removed,
            "Delivered buffer"
        );
        delivery
    }

    /// One sender report per live client, newest first
    pub fn stats(&self) -> Vec<StatsReport> {
        let live = self.live.lock();
        live.iter()
            .map(|(_, record)| StatsReport::sender(Some(&record.socket), Some(record.peer)))
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending_len.load(Ordering::Acquire)
    }

    /// Peers of the live clients, newest first
    pub fn live_peers(&self) -> Vec<SocketAddr> {
        let live = self.live.lock();
        live.iter().map(|(_, record)| record.peer).collect()
    }

    pub fn contains(&self, peer: SocketAddr) -> bool {
        let live = self.live.lock();
        let found = live.iter().any(|(_, record)| record.peer == peer);
        found
    }

    /// Close every client and refuse further admissions
    ///
    /// Returns the number of clients closed.
    pub fn shutdown(&self) -> usize {
        let mut closed = 0;
        let mut live = self.live.lock();

        for record in live.drain() {
            tracing::debug!(id = record.id, peer = %record.peer, "Closing live client");
            self.discard(record);
            closed += 1;
        }

        let mut pending = self.pending_rx.lock();
        pending.close();
        while let Ok(record) = pending.try_recv() {
            self.pending_len.fetch_sub(1, Ordering::AcqRel);
            tracing::debug!(id = record.id, peer = %record.peer, "Closing pending client");
            self.discard(record);
            closed += 1;
        }

        closed
    }
}
