//! SRT session constants

/// URI scheme accepted by every element
pub const SRT_URI_SCHEME: &str = "srt";

/// Default port when none is configured
pub const SRT_DEFAULT_PORT: u16 = 7001;

/// Default host when none is configured
pub const SRT_DEFAULT_HOST: &str = "127.0.0.1";

/// Default URI (`srt://127.0.0.1:7001`)
pub const SRT_DEFAULT_URI: &str = "srt://127.0.0.1:7001";

/// Default latency in milliseconds
pub const SRT_DEFAULT_LATENCY_MS: u32 = 125;

/// Default encryption key length in bytes
pub const SRT_DEFAULT_KEY_LENGTH: u32 = 16;

/// Address bound when only a bind port or rendezvous is configured
pub const SRT_DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Recommended send buffer size (1 MiB)
pub const SRT_SEND_BUFFER_SIZE: usize = 1024 * 1024;

/// Payload size assumed for one outbound message (MPEG-TS: 7 × 188)
pub const DEFAULT_MSG_SIZE: usize = 1316;

/// Largest payload one SRT live-mode message can carry
pub const SRT_LIVE_MAX_PAYLOAD_SIZE: usize = 1456;

/// Consecutive backpressure failures before a client is removed
pub const MAX_SEND_FAILS: u32 = 10;

/// IP type-of-service for outbound traffic (DSCP EF)
pub const SENDER_IP_TOS: i32 = 0xB8;

/// Overhead bandwidth allowed on top of the input rate, in percent
pub const SENDER_OVERHEAD_BW_PERCENT: i32 = 100;

/// Listen backlog of the fan-out server
pub const SERVER_SINK_BACKLOG: u32 = 5;

/// Listen backlog of the single-client server receiver
pub const SERVER_SOURCE_BACKLOG: u32 = 1;

/// Longest single readiness wait of a server, so cancellation is noticed
pub const CANCEL_POLL_INTERVAL_MS: u64 = 100;
