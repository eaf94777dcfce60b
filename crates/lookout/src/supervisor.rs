//! Capture process lifecycle supervision.
//!
//! The supervisor owns the ffmpeg source process. Its policy:
//! - the first launch's outcome is reported synchronously, so a bad
//!   device or missing binary fails startup visibly
//! - a deliberate reset kills the process and relaunches it
//! - an unexpected exit aborts the whole daemon after a fixed delay;
//!   capture is essential, and a silent gap is worse than a hard
//!   failure an operator will notice

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::segment::Segment;
use crate::segmenter;
use crate::source::{CaptureHandle, CaptureLauncher};

const RESTART_ABORT_DELAY: Duration = Duration::from_secs(5);

/// Supervision states, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Running,
    Restarting,
    Terminal,
}

impl SupervisorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupervisorState::Starting => "starting",
            SupervisorState::Running => "running",
            SupervisorState::Restarting => "restarting",
            SupervisorState::Terminal => "terminal",
        }
    }
}

/// Requests a capture restart. Single-slot: if a reset is already
/// pending, another request is redundant and dropped.
#[derive(Clone)]
pub struct ResetHandle {
    tx: mpsc::Sender<()>,
}

impl ResetHandle {
    pub fn request(&self) {
        let _ = self.tx.try_send(());
    }
}

pub struct Supervisor {
    launcher: Arc<dyn CaptureLauncher>,
    segment_tx: mpsc::Sender<Segment>,
    segment_target: Duration,
    reset_tx: mpsc::Sender<()>,
    reset_rx: mpsc::Receiver<()>,
    shutdown: CancellationToken,
}

impl Supervisor {
    pub fn new(
        launcher: Arc<dyn CaptureLauncher>,
        segment_tx: mpsc::Sender<Segment>,
        segment_target: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        let (reset_tx, reset_rx) = mpsc::channel(1);
        Supervisor {
            launcher,
            segment_tx,
            segment_target,
            reset_tx,
            reset_rx,
            shutdown,
        }
    }

    pub fn reset_handle(&self) -> ResetHandle {
        ResetHandle {
            tx: self.reset_tx.clone(),
        }
    }

    /// Run the supervision loop until shutdown or fatal abort.
    ///
    /// The outcome of the very first launch is sent on `first_result`.
    /// Returns `Err` when the loop ended by aborting the daemon.
    pub async fn run(
        mut self,
        first_result: oneshot::Sender<anyhow::Result<()>>,
    ) -> anyhow::Result<()> {
        let mut first = Some(first_result);
        let mut state = SupervisorState::Starting;

        loop {
            debug!(state = state.as_str(), "capture supervision");
            let handle = match self.launcher.launch().await {
                Ok(h) => {
                    if let Some(tx) = first.take() {
                        let _ = tx.send(Ok(()));
                    }
                    h
                }
                Err(e) => {
                    if let Some(tx) = first.take() {
                        let _ = tx.send(Err(e));
                        return Err(anyhow::anyhow!("first capture launch failed"));
                    }
                    error!("capture relaunch failed: {e:#}");
                    tokio::time::sleep(RESTART_ABORT_DELAY).await;
                    self.shutdown.cancel();
                    return Err(e.context("capture relaunch failed"));
                }
            };

            state = SupervisorState::Running;
            debug!(state = state.as_str(), "capture supervision");

            let CaptureHandle {
                stream,
                mut process,
            } = handle;

            let seg_cancel = self.shutdown.child_token();
            let seg_task = tokio::spawn(segmenter::run(
                stream,
                self.segment_target,
                self.segment_tx.clone(),
                self.reset_handle(),
                seg_cancel.clone(),
            ));

            tokio::select! {
                status = process.wait() => {
                    match status {
                        Ok(clean) => error!(clean, "capture process exited unexpectedly"),
                        Err(e) => error!("capture process wait failed: {e:#}"),
                    }
                    seg_cancel.cancel();
                    let _ = seg_task.await;
                    tokio::time::sleep(RESTART_ABORT_DELAY).await;
                    debug!(state = SupervisorState::Terminal.as_str(), "capture supervision");
                    self.shutdown.cancel();
                    return Err(anyhow::anyhow!("capture process died, aborting"));
                }
                _ = self.reset_rx.recv() => {
                    info!("resetting capture source");
                    let _ = process.kill().await;
                    let _ = process.wait().await;
                    seg_cancel.cancel();
                    let _ = seg_task.await;
                    state = SupervisorState::Restarting;
                    // loop back around and relaunch
                }
                _ = self.shutdown.cancelled() => {
                    let _ = process.kill().await;
                    let _ = process.wait().await;
                    let _ = seg_task.await;
                    debug!(state = SupervisorState::Terminal.as_str(), "capture supervision");
                    return Ok(());
                }
            }
        }
    }
}
