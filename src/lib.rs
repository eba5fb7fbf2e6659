//! SRT session layer
//!
//! Connection setup, multi-client fan-out and teardown for SRT streams on top
//! of a pluggable [`transport::Transport`]. Four roles share one session
//! shell:
//!
//! - [`ClientSink`]: connect to a remote listener and send
//! - [`ClientSource`]: connect to a remote listener and receive
//! - [`ServerSink`]: listen and fan every buffer out to all clients
//! - [`ServerSource`]: listen and receive from one client at a time
//!
//! Every role implements [`session::Element`]; senders add
//! [`session::Sink`] and receivers [`session::Source`].

pub mod client;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;
pub mod transport;

pub use client::{ClientConfig, ClientSink, ClientSource};
pub use error::{ConfigError, ConnectError, Error, Result};
pub use registry::ClientEvent;
pub use server::{ServerConfig, ServerSink, ServerSource};
pub use session::{Element, FillOutcome, SessionConfig, Sink, Source};
pub use stats::{StatsReport, StatsSnapshot};
pub use transport::{SharedTransport, Transport};
