//! Base session shell
//!
//! State every role shares: the typed configuration, the cancellation flag,
//! the started marker, the base time used for buffer timestamps and the
//! resolved address of the session.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::ConfigError;
use crate::protocol::options::Passphrase;

use super::caps::Caps;
use super::clock::{Clock, MonotonicClock};
use super::config::SessionConfig;

/// Shared state of one element
pub struct SessionBase<C> {
    config: Mutex<C>,
    cancelled: Arc<AtomicBool>,
    started: AtomicBool,
    clock: Arc<dyn Clock>,
    base_time: Mutex<Duration>,
    address: Mutex<Option<SocketAddr>>,
}

impl<C> SessionBase<C>
where
    C: Clone + AsRef<SessionConfig> + AsMut<SessionConfig>,
{
    pub fn new(config: C) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(config: C, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: Mutex::new(config),
            cancelled: Arc::new(AtomicBool::new(false)),
            started: AtomicBool::new(false),
            clock,
            base_time: Mutex::new(Duration::ZERO),
            address: Mutex::new(None),
        }
    }

    /// Copy of the current configuration
    pub fn config(&self) -> C {
        self.config.lock().clone()
    }

    /// Apply a fallible update atomically
    ///
    /// The update runs on a copy; the stored configuration only changes when
    /// it succeeds.
    pub fn update_config<F>(&self, update: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut C) -> Result<(), ConfigError>,
    {
        let mut config = self.config.lock();
        let mut candidate = config.clone();
        update(&mut candidate)?;
        *config = candidate;
        Ok(())
    }

    /// Change the URI; refused while started
    pub fn set_uri(&self, uri: &str) -> Result<(), ConfigError> {
        if self.is_started() {
            return Err(ConfigError::Busy("uri"));
        }
        self.update_config(|c| c.as_mut().set_uri(uri))
    }

    pub fn uri(&self) -> String {
        self.config.lock().as_ref().uri.to_string()
    }

    pub fn set_latency(&self, latency_ms: u32) {
        self.config.lock().as_mut().latency_ms = latency_ms;
    }

    pub fn set_passphrase(&self, passphrase: Option<&str>) {
        self.config.lock().as_mut().passphrase = passphrase.map(Passphrase::new);
    }

    pub fn set_key_length(&self, bytes: u32) -> Result<(), ConfigError> {
        self.update_config(|c| c.as_mut().set_key_length(bytes))
    }

    pub fn set_poll_timeout_ms(&self, ms: i32) {
        self.config.lock().as_mut().set_poll_timeout_ms(ms);
    }

    pub fn set_caps(&self, caps: Option<Caps>) {
        self.config.lock().as_mut().caps = caps;
    }

    pub fn caps(&self, filter: Option<&Caps>) -> Caps {
        let config = self.config.lock();
        Caps::query(config.as_ref().caps.as_ref(), filter)
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        self.config.lock().as_ref().poll_timeout
    }

    /// Flag observed by blocking loops
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn clear_cancel(&self) {
        self.cancelled.store(false, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Mark started and capture the base time
    pub fn mark_started(&self) {
        *self.base_time.lock() = self.clock.now();
        self.clear_cancel();
        self.started.store(true, Ordering::Release);
    }

    /// Mark stopped; returns whether the element was started
    pub fn mark_stopped(&self) -> bool {
        *self.address.lock() = None;
        self.started.swap(false, Ordering::AcqRel)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Clock time elapsed since start
    pub fn running_time(&self) -> Duration {
        self.clock.now().saturating_sub(*self.base_time.lock())
    }

    pub fn set_address(&self, address: Option<SocketAddr>) {
        *self.address.lock() = address;
    }

    pub fn address(&self) -> Option<SocketAddr> {
        *self.address.lock()
    }
}
