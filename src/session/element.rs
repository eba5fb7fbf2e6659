//! Lifecycle interface shared by every role
//!
//! The surrounding media framework drives elements only through these traits:
//!
//! ```text
//!   start() ──► send()/fill() ... ──► unlock() ──► stop()
//!                     ▲                  │
//!                     └─ unlock_stop() ◄─┘
//! ```

use bytes::BytesMut;

use crate::error::Result;
use crate::stats::StatsSnapshot;

use super::buffer::FillOutcome;
use super::caps::Caps;

/// Common element lifecycle
pub trait Element: Send + Sync {
    /// Acquire transport resources; on failure everything acquired is released
    fn start(&self) -> Result<()>;

    /// Tear down; never fails on release errors, which are only logged
    fn stop(&self) -> Result<()>;

    /// Interrupt any blocking wait so the calling thread returns promptly
    fn unlock(&self);

    /// Clear the cancellation set by `unlock`
    fn unlock_stop(&self);

    /// Answer a caps query
    fn caps(&self, filter: Option<&Caps>) -> Caps;

    /// Current transport statistics
    fn stats(&self) -> StatsSnapshot;
}

/// Element consuming buffers from the framework
pub trait Sink: Element {
    fn send(&self, buffer: &[u8]) -> Result<()>;
}

/// Element producing buffers for the framework
///
/// `buffer` arrives sized to the maximum message length and is truncated to
/// the received length when filled.
pub trait Source: Element {
    fn fill(&self, buffer: &mut BytesMut) -> Result<FillOutcome>;
}
