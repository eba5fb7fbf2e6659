//! SRT server roles
//!
//! [`ServerSink`] fans one stream out to any number of clients accepted on a
//! background thread. [`ServerSource`] receives from a single client and
//! re-accepts when it leaves.

pub mod config;
pub mod listener;
pub mod sink;
pub mod source;

pub use config::ServerConfig;
pub use listener::{wait_cancellable, Listener, WaitOutcome, ACCEPT_THREAD_NAME};
pub use sink::ServerSink;
pub use source::ServerSource;
