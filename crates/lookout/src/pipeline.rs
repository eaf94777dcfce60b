//! The single consumer loop.
//!
//! Receives completed segments in arrival order and, for each one
//! sequentially: pushes it into the live ring, archives it, runs
//! motion detection, and notifies on motion. Collaborator failures are
//! logged and never stop the loop; an abnormal re-decode raises a
//! capture reset instead.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::archive::SegmentArchive;
use crate::motion::MotionDetector;
use crate::notify::MotionNotifier;
use crate::presence::PresenceFlag;
use crate::segment::{Segment, SegmentRing};
use crate::supervisor::ResetHandle;

pub struct Pipeline {
    ring: Arc<SegmentRing>,
    detector: MotionDetector,
    archive: Option<SegmentArchive>,
    notifier: Option<Arc<dyn MotionNotifier>>,
    presence: PresenceFlag,
    reset: ResetHandle,
}

impl Pipeline {
    pub fn new(
        ring: Arc<SegmentRing>,
        detector: MotionDetector,
        archive: Option<SegmentArchive>,
        notifier: Option<Arc<dyn MotionNotifier>>,
        presence: PresenceFlag,
        reset: ResetHandle,
    ) -> Self {
        Pipeline {
            ring,
            detector,
            archive,
            notifier,
            presence,
            reset,
        }
    }

    pub async fn run(self, mut segments: mpsc::Receiver<Segment>, cancel: CancellationToken) {
        loop {
            let segment = tokio::select! {
                _ = cancel.cancelled() => return,
                seg = segments.recv() => match seg {
                    Some(s) => s,
                    None => return,
                },
            };
            self.process(segment).await;
        }
    }

    async fn process(&self, segment: Segment) {
        self.ring.push(segment.clone());

        if let Some(archive) = &self.archive {
            match archive.store(&segment).await {
                Ok(path) => info!("archived segment to {}", path.display()),
                Err(e) => error!("segment archive failed: {e}"),
            }
        }

        let report = match self.detector.detect(&segment).await {
            Ok(r) => r,
            Err(e) => {
                error!("motion decode launch failed: {e:#}, requesting capture reset");
                self.reset.request();
                return;
            }
        };

        if report.decode_failed {
            error!(
                segment = segment.id(),
                "motion decode exited abnormally, requesting capture reset"
            );
            self.reset.request();
            return;
        }

        if !report.has_motion() {
            return;
        }

        let is_home = self.presence.is_home();
        info!(
            segment = segment.id(),
            frames = report.frames.len(),
            is_home,
            "motion detected"
        );
        if is_home {
            return;
        }

        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify(&segment, &report).await {
                error!("motion notification failed: {e:#}");
            }
        }
    }
}
