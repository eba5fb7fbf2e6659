//! Statistics for SRT sessions

pub mod metrics;

pub use metrics::{
    Counters, ReceiverStats, SenderStats, StatValue, StatsReport, StatsSnapshot,
};
