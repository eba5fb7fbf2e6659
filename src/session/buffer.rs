//! Buffer metadata and receive-side sequence tracking

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;

use crate::protocol::constants::SRT_LIVE_MAX_PAYLOAD_SIZE;
use crate::transport::{MsgCtrl, SrtSocket, TransportError};

/// Metadata attached to a filled buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferMeta {
    /// Presentation time: element clock minus base time
    pub pts: Duration,

    /// Source time stamped by the remote sender, in microseconds
    ///
    /// Downstream SRT senders can reuse it to keep the original timing.
    pub src_time: Option<u64>,

    /// Message number assigned by the remote sender
    pub msg_no: Option<i32>,
}

impl BufferMeta {
    pub fn new(pts: Duration, ctrl: &MsgCtrl) -> Self {
        Self {
            pts,
            src_time: (ctrl.src_time != 0).then_some(ctrl.src_time),
            msg_no: (ctrl.msg_no != 0).then_some(ctrl.msg_no),
        }
    }
}

/// Result of a `fill` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// Buffer was filled and truncated to the received size
    Filled(BufferMeta),
    /// Nothing ready within the poll timeout; try again
    NoData,
    /// Remote side ended the stream
    Eos,
    /// Wait was cancelled by `unlock`
    Flushing,
}

/// A detected hole in the message sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub last: i32,
    pub next: i32,
    pub dropped: i32,
}

/// Tracks message numbers to report gaps
///
/// Gaps are only reported; lost messages are not recovered here.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    last: Option<i32>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<i32> {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Record a message number, returning the gap it closes if any
    pub fn observe(&mut self, msg_no: i32) -> Option<Gap> {
        let gap = match self.last {
            Some(last) if msg_no.wrapping_sub(last) > 1 => Some(Gap {
                last,
                next: msg_no,
                dropped: msg_no.wrapping_sub(last) - 1,
            }),
            _ => None,
        };
        self.last = Some(msg_no);
        gap
    }
}

/// Bootstrap payloads sent ahead of media
///
/// Sinks send these to every new receiver (e.g. codec or container headers)
/// before the first media buffer.
#[derive(Debug, Default)]
pub struct StreamHeaders {
    headers: Mutex<Vec<Bytes>>,
}

impl StreamHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, headers: Vec<Bytes>) {
        *self.headers.lock() = headers;
    }

    pub fn snapshot(&self) -> Vec<Bytes> {
        self.headers.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.lock().is_empty()
    }

    /// Send every header through `send`, stopping at the first failure
    pub fn send_all<F>(&self, mut send: F) -> Result<usize, TransportError>
    where
        F: FnMut(&[u8]) -> Result<usize, TransportError>,
    {
        let headers = self.snapshot();
        for header in &headers {
            send(header)?;
        }
        Ok(headers.len())
    }
}

/// Receive one message from `socket` into `buffer`
///
/// The buffer is grown to the largest live-mode payload if needed and
/// truncated to the received length. Returns `None` at end of stream. `pts`
/// is evaluated only once a message has arrived.
pub fn receive_message<F>(
    socket: &SrtSocket,
    buffer: &mut BytesMut,
    sequence: &mut SequenceTracker,
    pts: F,
) -> Result<Option<BufferMeta>, TransportError>
where
    F: FnOnce() -> Duration,
{
    if buffer.len() < SRT_LIVE_MAX_PAYLOAD_SIZE {
        buffer.resize(SRT_LIVE_MAX_PAYLOAD_SIZE, 0);
    }

    let (len, ctrl) = socket.recv(&mut buffer[..])?;
    if len == 0 {
        return Ok(None);
    }
    buffer.truncate(len);

    let meta = BufferMeta::new(pts(), &ctrl);
    if let Some(msg_no) = meta.msg_no {
        if let Some(gap) = sequence.observe(msg_no) {
            tracing::warn!(
                socket = socket.raw(),
                last = gap.last,
                next = gap.next,
                dropped = gap.dropped,
                "Lost messages in SRT stream"
            );
        }
    }

    tracing::trace!(socket = socket.raw(), size = len, msg_no = ctrl.msg_no, "Received message");
    Ok(Some(meta))
}
