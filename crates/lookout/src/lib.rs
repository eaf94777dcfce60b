//! Lookout - unattended camera recorder
//!
//! Continuously captures an h264 feed from a v4l2 device through a
//! supervised ffmpeg process, cuts the MPEG-TS output into
//! independently playable segments, keeps the most recent segments in
//! a bounded ring for live viewing, and runs a motion-detection pass
//! over every segment via an edge-detect re-decode.
//!
//! Module map:
//! - [`segment`]: the `Segment` record and the bounded live ring
//! - [`mpegts`]: transport packet inspection (sync, payload, NALU scan)
//! - [`segmenter`]: wall-clock segment cutting with parameter-set carry
//! - [`source`]: ffmpeg process launching behind injectable traits
//! - [`supervisor`]: capture process lifecycle and restart policy
//! - [`strategy`] / [`motion`]: per-frame motion scoring and the
//!   re-decode driver
//! - [`pipeline`]: the single consumer loop tying it all together
//! - [`web`]: live playlist + segment serving
//! - [`archive`], [`notify`], [`presence`]: side collaborators

pub mod archive;
pub mod motion;
pub mod mpegts;
pub mod notify;
pub mod pipeline;
pub mod presence;
pub mod segment;
pub mod segmenter;
pub mod source;
pub mod strategy;
pub mod supervisor;
pub mod web;

pub use motion::{MotionDetector, MotionFrame, MotionReport};
pub use pipeline::Pipeline;
pub use segment::{Segment, SegmentRing};
pub use supervisor::{ResetHandle, Supervisor, SupervisorState};
