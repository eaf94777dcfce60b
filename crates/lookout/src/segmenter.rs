//! Cuts the capture stream into independently playable segments.
//!
//! The cutter accumulates transport packets until the wall-clock
//! target elapses, but never cuts mid-frame: a packet carrying a
//! parameter-set unit is withheld, and when the deadline has passed it
//! becomes the first packet of the next segment instead of orphaned
//! tail data of the current one. Every emitted segment therefore opens
//! with the parameter sets its frames depend on.

use std::time::Duration;

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::mpegts::{self, PacketError, PACKET_LEN};
use crate::segment::Segment;
use crate::supervisor::ResetHandle;

// 10fps * 10s of packets, the common case for one segment
const SEGMENT_BUF_CAPACITY: usize = PACKET_LEN * 10 * 10;

/// Pure segment-cutting state machine. Fed one packet at a time with
/// the current instant so cutting decisions are testable without a
/// live stream.
pub struct Cutter {
    target: Duration,
    buf: BytesMut,
    frames: usize,
    start: DateTime<Utc>,
    deadline: Instant,
    pending: Option<[u8; PACKET_LEN]>,
    open: bool,
}

impl Cutter {
    pub fn new(target: Duration) -> Self {
        Cutter {
            target,
            buf: BytesMut::with_capacity(SEGMENT_BUF_CAPACITY),
            frames: 0,
            start: Utc::now(),
            deadline: Instant::now(),
            pending: None,
            open: false,
        }
    }

    /// Feed one packet. Returns a completed segment when the packet
    /// triggered a cut.
    pub fn feed(
        &mut self,
        pkt: &[u8; PACKET_LEN],
        now: Instant,
    ) -> Result<Option<Segment>, PacketError> {
        if !self.open {
            self.open_segment(now);
        }

        let mut emitted = None;

        // A withheld parameter-set packet either heads the next
        // segment (deadline passed) or rejoins the current one.
        if let Some(pending) = self.pending.take() {
            if now >= self.deadline {
                emitted = Some(self.close_segment(now));
            }
            self.buf.extend_from_slice(&pending);
        }

        let scan = mpegts::scan_packet(pkt)?;
        self.frames += scan.frame_units;

        if scan.parameter_set {
            if now >= self.deadline && emitted.is_none() {
                emitted = Some(self.close_segment(now));
            }
            self.pending = Some(*pkt);
        } else {
            self.buf.extend_from_slice(pkt);
        }

        Ok(emitted)
    }

    fn open_segment(&mut self, now: Instant) {
        self.start = Utc::now();
        self.deadline = now + self.target;
        self.open = true;
    }

    fn close_segment(&mut self, now: Instant) -> Segment {
        let data = self.buf.split().freeze();
        let segment = Segment {
            start: self.start,
            data,
            frames: self.frames,
        };
        self.frames = 0;
        self.open_segment(now);
        segment
    }
}

/// Read 188-byte packets from the capture process until the stream
/// ends or cancellation, pushing completed segments onto `tx`.
///
/// End-of-stream is not an error here: it means the capture process
/// exited, which is the supervisor's concern. A malformed packet means
/// the stream is desynchronized, so a capture reset is requested. A
/// full hand-off queue blocks the reader; dropping a capture window is
/// worse than backpressure.
pub async fn run(
    mut stream: impl AsyncRead + Unpin,
    target: Duration,
    tx: mpsc::Sender<Segment>,
    reset: ResetHandle,
    cancel: CancellationToken,
) {
    let mut cutter = Cutter::new(target);
    let mut pkt = [0u8; PACKET_LEN];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            res = stream.read_exact(&mut pkt) => {
                if let Err(e) = res {
                    // EOF or read error: the in-progress segment is
                    // abandoned unflushed
                    debug!("capture stream ended: {e}");
                    return;
                }
            }
        }

        match cutter.feed(&pkt, Instant::now()) {
            Ok(Some(segment)) => {
                debug!(
                    id = segment.id(),
                    frames = segment.frames,
                    bytes = segment.data.len(),
                    "segment complete"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    res = tx.send(segment) => {
                        if res.is_err() {
                            return;
                        }
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("malformed transport packet ({e}), requesting capture reset");
                reset.request();
                return;
            }
        }
    }
}
