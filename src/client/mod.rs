//! SRT client roles
//!
//! - [`ClientSink`]: connects to a remote listener and sends buffers
//! - [`ClientSource`]: connects to a remote listener, optionally bound or in
//!   rendezvous mode, and fills buffers

pub mod config;
pub mod connector;
pub mod sink;
pub mod source;

pub use config::ClientConfig;
pub use connector::{connect, ConnectRequest, Connection};
pub use sink::ClientSink;
pub use source::ClientSource;
