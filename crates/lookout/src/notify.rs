//! Motion notifications.
//!
//! Invoked only for segments that have motion, and only when nobody is
//! home. Notifier failures are logged by the pipeline, never
//! propagated.

use async_trait::async_trait;
use serde::Serialize;

use crate::motion::MotionReport;
use crate::segment::Segment;

#[async_trait]
pub trait MotionNotifier: Send + Sync {
    async fn notify(&self, segment: &Segment, report: &MotionReport) -> anyhow::Result<()>;
}

/// POSTs a JSON motion summary to a webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    camera_name: String,
}

#[derive(Debug, Serialize)]
struct MotionEvent<'a> {
    camera: &'a str,
    segment: i64,
    start: String,
    /// Count of flagged frames.
    frames: usize,
    /// Index of the largest-magnitude flagged frame.
    best_frame: Option<usize>,
    best_magnitude: Option<u64>,
}

impl WebhookNotifier {
    pub fn new(url: String, camera_name: String) -> Self {
        WebhookNotifier {
            client: reqwest::Client::new(),
            url,
            camera_name,
        }
    }

    fn event<'a>(&'a self, segment: &Segment, report: &MotionReport) -> MotionEvent<'a> {
        let best = report.best();
        MotionEvent {
            camera: &self.camera_name,
            segment: segment.id(),
            start: segment.start.to_rfc3339(),
            frames: report.frames.len(),
            best_frame: best.map(|f| f.index),
            best_magnitude: best.map(|f| f.magnitude),
        }
    }
}

#[async_trait]
impl MotionNotifier for WebhookNotifier {
    async fn notify(&self, segment: &Segment, report: &MotionReport) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(&self.event(segment, report))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
