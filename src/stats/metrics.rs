//! Statistics snapshots for SRT sockets

use std::net::SocketAddr;

use crate::transport::{SrtSocket, TransportStats};

/// Sender-side counters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SenderStats {
    /// Sent data packets, including retransmissions
    pub packets_sent: i64,
    /// Lost packets (sender side)
    pub packets_sent_lost: i32,
    pub packets_retransmitted: i32,
    pub packet_ack_received: i32,
    pub packet_nack_received: i32,
    /// Busy sending time (idle time excluded)
    pub send_duration_us: i64,
    /// Sent data bytes, including retransmissions
    pub bytes_sent: u64,
    pub bytes_retransmitted: u64,
    /// Too-late-to-send dropped bytes
    pub bytes_sent_dropped: u64,
    /// Too-late-to-send dropped packets
    pub packets_sent_dropped: i32,
    pub send_rate_mbps: f64,
    /// Estimated bandwidth
    pub bandwidth_mbps: f64,
    pub rtt_ms: f64,
}

impl From<&TransportStats> for SenderStats {
    fn from(s: &TransportStats) -> Self {
        Self {
            packets_sent: s.pkt_sent,
            packets_sent_lost: s.pkt_snd_loss,
            packets_retransmitted: s.pkt_retrans,
            packet_ack_received: s.pkt_recv_ack,
            packet_nack_received: s.pkt_recv_nak,
            send_duration_us: s.us_snd_duration,
            bytes_sent: s.byte_sent,
            bytes_retransmitted: s.byte_retrans,
            bytes_sent_dropped: s.byte_snd_drop,
            packets_sent_dropped: s.pkt_snd_drop,
            send_rate_mbps: s.mbps_send_rate,
            bandwidth_mbps: s.mbps_bandwidth,
            rtt_ms: s.ms_rtt,
        }
    }
}

/// Receiver-side counters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReceiverStats {
    pub packets_recv: i64,
    /// Lost packets, receiver side (some loss is expected)
    pub packets_recv_lost: i32,
    pub packets_retransmitted: i32,
    pub packet_ack_received: i32,
    pub packet_nack_received: i32,
    pub bytes_received: u64,
    pub bytes_retransmitted: u64,
    /// Too-late-to-play dropped bytes (estimated from average packet size)
    pub bytes_recv_dropped: u64,
    /// Too-late-to-play dropped packets
    pub packets_recv_dropped: i32,
    pub recv_rate_mbps: f64,
    pub bandwidth_mbps: f64,
    pub rtt_ms: f64,
}

impl From<&TransportStats> for ReceiverStats {
    fn from(s: &TransportStats) -> Self {
        Self {
            packets_recv: s.pkt_recv,
            packets_recv_lost: s.pkt_rcv_loss,
            packets_retransmitted: s.pkt_retrans,
            packet_ack_received: s.pkt_recv_ack,
            packet_nack_received: s.pkt_recv_nak,
            bytes_received: s.byte_recv,
            bytes_retransmitted: s.byte_retrans,
            bytes_recv_dropped: s.byte_rcv_loss,
            packets_recv_dropped: s.pkt_rcv_drop,
            recv_rate_mbps: s.mbps_recv_rate,
            bandwidth_mbps: s.mbps_bandwidth,
            rtt_ms: s.ms_rtt,
        }
    }
}

/// Counters of one socket
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Counters {
    Sender(SenderStats),
    Receiver(ReceiverStats),
}

/// A single field value in the flattened report
#[derive(Debug, Clone, PartialEq)]
pub enum StatValue {
    Int(i64),
    UInt(u64),
    Double(f64),
    Str(String),
}

/// Statistics for one socket
///
/// An empty report (no address, no counters) is returned for sockets that
/// are not open; it is not an error.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatsReport {
    pub address: Option<SocketAddr>,
    pub counters: Option<Counters>,
}

impl StatsReport {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.address.is_none() && self.counters.is_none()
    }

    /// Sender report; needs both an open socket and its peer address
    pub fn sender(socket: Option<&SrtSocket>, address: Option<SocketAddr>) -> Self {
        let (Some(socket), Some(address)) = (socket.filter(|s| !s.is_closed()), address) else {
            return Self::empty();
        };

        let counters = match socket.stats() {
            Ok(stats) => Some(Counters::Sender(SenderStats::from(&stats))),
            Err(e) => {
                tracing::debug!(socket = socket.raw(), error = %e, "Failed to query SRT stats");
                None
            }
        };

        Self {
            address: Some(address),
            counters,
        }
    }

    /// Receiver report; the address is included when known
    pub fn receiver(socket: Option<&SrtSocket>, address: Option<SocketAddr>) -> Self {
        let Some(socket) = socket.filter(|s| !s.is_closed()) else {
            return Self::empty();
        };

        let counters = match socket.stats() {
            Ok(stats) => Some(Counters::Receiver(ReceiverStats::from(&stats))),
            Err(e) => {
                tracing::debug!(socket = socket.raw(), error = %e, "Failed to query SRT stats");
                None
            }
        };

        Self { address, counters }
    }

    pub fn sender_stats(&self) -> Option<&SenderStats> {
        match self.counters {
            Some(Counters::Sender(ref s)) => Some(s),
            _ => None,
        }
    }

    pub fn receiver_stats(&self) -> Option<&ReceiverStats> {
        match self.counters {
            Some(Counters::Receiver(ref s)) => Some(s),
            _ => None,
        }
    }

    /// Flatten into named fields, in the property naming used by the framework
    pub fn fields(&self) -> Vec<(&'static str, StatValue)> {
        use StatValue::*;

        let mut fields = Vec::new();
        match self.counters {
            Some(Counters::Sender(s)) => fields.extend([
                ("packets-sent", Int(s.packets_sent)),
                ("packets-sent-lost", Int(s.packets_sent_lost.into())),
                ("packets-retransmitted", Int(s.packets_retransmitted.into())),
                ("packet-ack-received", Int(s.packet_ack_received.into())),
                ("packet-nack-received", Int(s.packet_nack_received.into())),
                ("send-duration-us", Int(s.send_duration_us)),
                ("bytes-sent", UInt(s.bytes_sent)),
                ("bytes-retransmitted", UInt(s.bytes_retransmitted)),
                ("bytes-sent-dropped", UInt(s.bytes_sent_dropped)),
                ("packets-sent-dropped", Int(s.packets_sent_dropped.into())),
                ("send-rate-mbps", Double(s.send_rate_mbps)),
                ("bandwidth-mbps", Double(s.bandwidth_mbps)),
                ("rtt-ms", Double(s.rtt_ms)),
            ]),
            Some(Counters::Receiver(r)) => fields.extend([
                ("packets-recv", Int(r.packets_recv)),
                ("packets-recv-lost", Int(r.packets_recv_lost.into())),
                ("packets-retransmitted", Int(r.packets_retransmitted.into())),
                ("packet-ack-received", Int(r.packet_ack_received.into())),
                ("packet-nack-received", Int(r.packet_nack_received.into())),
                ("bytes-received", UInt(r.bytes_received)),
                ("bytes-retransmitted", UInt(r.bytes_retransmitted)),
                ("bytes-recv-dropped", UInt(r.bytes_recv_dropped)),
                ("packets-recv-dropped", Int(r.packets_recv_dropped.into())),
                ("recv-rate-mbps", Double(r.recv_rate_mbps)),
                ("bandwidth-mbps", Double(r.bandwidth_mbps)),
                ("rtt-ms", Double(r.rtt_ms)),
            ]),
            None => {}
        }

        if let Some(address) = self.address {
            fields.push(("sockaddr-str", Str(address.to_string())));
        }

        fields
    }
}

/// Statistics exposed by an element
#[derive(Debug, Clone, PartialEq)]
pub enum StatsSnapshot {
    /// Single-socket roles
    Single(StatsReport),
    /// Fan-out server: one report per live client
    PerClient(Vec<StatsReport>),
}

impl StatsSnapshot {
    pub fn reports(&self) -> &[StatsReport] {
        match self {
            StatsSnapshot::Single(report) => std::slice::from_ref(report),
            StatsSnapshot::PerClient(reports) => reports,
        }
    }
}
