//! SRT protocol-level settings
//!
//! Constants and the socket option profile shared by every role.

pub mod constants;
pub mod options;

pub use options::{KeyLength, OptionProfile, Passphrase, Role, SocketOption};
