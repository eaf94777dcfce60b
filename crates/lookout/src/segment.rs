//! Segments and the bounded live-segment ring.
//!
//! A `Segment` is immutable once emitted: its body is a shared `Bytes`
//! buffer, so the ring, the archive, and the motion detector can all
//! hold it concurrently without copying or locking.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Nominal capture frame rate; segment durations are frames / this.
pub const NOMINAL_FPS: f64 = 10.0;

/// One bounded chunk of captured MPEG-TS bytes.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Wall-clock time the segment started.
    pub start: DateTime<Utc>,
    /// Raw transport-packet bytes, never mutated after emission.
    pub data: Bytes,
    /// Count of frame units (IDR + non-IDR) observed while cutting.
    pub frames: usize,
}

impl Segment {
    /// Microsecond start-time identifier. Monotonic across segments
    /// because segments are cut sequentially from one stream.
    pub fn id(&self) -> i64 {
        self.start.timestamp_micros()
    }

    /// Nominal playback duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / NOMINAL_FPS
    }
}

/// Fixed-capacity, oldest-eviction cache of the most recent segments.
pub struct SegmentRing {
    inner: Mutex<RingInner>,
}

struct RingInner {
    segments: Vec<Segment>,
    oldest: usize,
    max: usize,
}

impl SegmentRing {
    /// A ring always holds at least one segment; a zero capacity from
    /// config is treated as one.
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        SegmentRing {
            inner: Mutex::new(RingInner {
                segments: Vec::with_capacity(max),
                oldest: 0,
                max,
            }),
        }
    }

    /// Append a segment, overwriting the oldest slot once full.
    /// Never blocks beyond the record copy, never fails.
    pub fn push(&self, segment: Segment) {
        let mut inner = self.inner.lock().unwrap();
        if inner.segments.len() < inner.max {
            inner.segments.push(segment);
            return;
        }

        let oldest = inner.oldest;
        inner.segments[oldest] = segment;
        inner.oldest = (oldest + 1) % inner.max;
    }

    /// Ordered oldest-to-newest copy of the current contents.
    ///
    /// Only the small segment records are copied under the lock; the
    /// byte bodies are shared and immutable, so the returned snapshot
    /// stays valid regardless of later pushes.
    pub fn snapshot(&self) -> Vec<Segment> {
        let inner = self.inner.lock().unwrap();
        let mut out = Vec::with_capacity(inner.segments.len());
        for i in 0..inner.segments.len() {
            let idx = (i + inner.oldest) % inner.max;
            out.push(inner.segments[idx].clone());
        }
        out
    }

    /// Look up a held segment by its microsecond identifier.
    pub fn find(&self, id: i64) -> Option<Segment> {
        self.snapshot().into_iter().find(|s| s.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn seg(n: i64) -> Segment {
        Segment {
            start: Utc.timestamp_micros(n).unwrap(),
            data: Bytes::from(vec![n as u8; 4]),
            frames: 100,
        }
    }

    #[test]
    fn test_push_under_capacity() {
        let ring = SegmentRing::new(3);
        ring.push(seg(1));
        ring.push(seg(2));

        let snap = ring.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].id(), 1);
        assert_eq!(snap[1].id(), 2);
    }

    #[test]
    fn test_zero_capacity_clamps_to_one() {
        let ring = SegmentRing::new(0);
        ring.push(seg(1));
        ring.push(seg(2));

        let snap = ring.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].id(), 2);
    }

    #[test]
    fn test_oldest_eviction() {
        let ring = SegmentRing::new(3);
        for n in 1..=5 {
            ring.push(seg(n));
        }

        let snap = ring.snapshot();
        assert_eq!(snap.len(), 3);
        let ids: Vec<i64> = snap.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[test]
    fn test_snapshot_idempotent() {
        let ring = SegmentRing::new(3);
        for n in 1..=4 {
            ring.push(seg(n));
        }

        let a: Vec<i64> = ring.snapshot().iter().map(|s| s.id()).collect();
        let b: Vec<i64> = ring.snapshot().iter().map(|s| s.id()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_find_after_push() {
        let ring = SegmentRing::new(3);
        ring.push(seg(42));

        let found = ring.find(42).unwrap();
        assert_eq!(found.data, Bytes::from(vec![42u8; 4]));
        assert!(ring.find(43).is_none());
    }

    #[test]
    fn test_find_evicted_is_gone() {
        let ring = SegmentRing::new(2);
        ring.push(seg(1));
        ring.push(seg(2));
        ring.push(seg(3));

        assert!(ring.find(1).is_none());
        assert!(ring.find(2).is_some());
        assert!(ring.find(3).is_some());
    }

    #[test]
    fn test_duration_from_frames() {
        let s = seg(1);
        assert_eq!(s.duration_secs(), 10.0);
    }
}
