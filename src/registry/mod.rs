//! Client registry for fan-out servers
//!
//! The accept thread admits clients into a pending queue; the data thread
//! promotes them to the live list once they have received the stream headers
//! and their first buffer.
//!
//! # Architecture
//!
//! ```text
//!    accept thread                            data thread
//!   ┌──────────────┐                        ┌──────────────────────┐
//!   │ accept()     │                        │ deliver(payload)     │
//!   │   │          │   pending (unbounded)  │   1. live: check +   │
//!   │   └─ admit() ├──────────────────────► │      send / evict    │
//!   └──────────────┘                        │   2. pending: headers│
//!          │                                │      + payload, then │
//!          │ Added                          │      prepend to live │
//!          ▼                                └──────────┬───────────┘
//!   ┌──────────────────────────────────┐               │ Removed
//!   │ events: mpsc::UnboundedSender    │ ◄─────────────┘
//!   └──────────────────────────────────┘
//! ```
//!
//! A client is in at most one of {pending, live} at any time, and every
//! `Added` event is matched by exactly one `Removed` event.

pub mod arena;
pub mod entry;
pub mod event;
pub mod store;

pub use arena::{Arena, ClientKey};
pub use entry::{Backpressure, ClientRecord};
pub use event::ClientEvent;
pub use store::{ClientRegistry, Delivery};
