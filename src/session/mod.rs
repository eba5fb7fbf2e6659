//! Base session shell
//!
//! Everything the four roles share: typed configuration, lifecycle traits,
//! the element clock, caps handling, stream headers and receive-side buffer
//! metadata.

pub mod buffer;
pub mod caps;
pub mod clock;
pub mod config;
pub mod element;
pub mod state;

pub use buffer::{BufferMeta, FillOutcome, Gap, SequenceTracker, StreamHeaders};
pub use caps::Caps;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{SessionConfig, SrtUri};
pub use element::{Element, Sink, Source};
pub use state::SessionBase;
