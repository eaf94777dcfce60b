//! Motion detection over one segment.
//!
//! The segment's bytes are fed through a fresh edge-detect re-decode
//! process and the resulting grayscale frames are scored by the
//! configured strategy. The writer runs as its own task so a full
//! decode pipe can never deadlock against the frame reader.

use std::io::ErrorKind;
use std::sync::Arc;

use lookoutconf::MotionConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::warn;

use crate::segment::Segment;
use crate::source::{DecodeHandle, DecodeLauncher};
use crate::strategy::{self, FRAME_BYTES};

/// A frame whose motion score crossed the strategy threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionFrame {
    /// Frame index within the segment.
    pub index: usize,
    /// Strategy-specific magnitude; comparable within one report.
    pub magnitude: u64,
}

/// Outcome of one detection pass.
#[derive(Debug, Default)]
pub struct MotionReport {
    pub frames: Vec<MotionFrame>,
    /// The re-decode exited abnormally. Flagged frames collected
    /// before the failure are still present, but the caller should
    /// treat this as a desynchronized capture stream and request a
    /// reset.
    pub decode_failed: bool,
}

impl MotionReport {
    /// A single flagged frame is treated as noise.
    pub fn has_motion(&self) -> bool {
        self.frames.len() > 1
    }

    /// The flagged frame with the largest magnitude.
    pub fn best(&self) -> Option<&MotionFrame> {
        self.frames.iter().max_by_key(|f| f.magnitude)
    }
}

pub struct MotionDetector {
    launcher: Arc<dyn DecodeLauncher>,
    config: MotionConfig,
}

impl MotionDetector {
    pub fn new(launcher: Arc<dyn DecodeLauncher>, config: MotionConfig) -> Self {
        MotionDetector { launcher, config }
    }

    /// Run one detection pass. `Err` means the re-decode could not
    /// even be launched; an abnormal exit after launch is reported in
    /// the `MotionReport` instead.
    pub async fn detect(&self, segment: &Segment) -> anyhow::Result<MotionReport> {
        let DecodeHandle {
            input,
            mut output,
            mut process,
        } = self.launcher.launch().await?;

        let data = segment.data.clone();
        let writer = tokio::spawn(async move {
            let mut input = input;
            if input.write_all(&data).await.is_ok() {
                let _ = input.shutdown().await;
            }
        });

        let mut strategy = strategy::for_config(&self.config);
        let mut report = MotionReport::default();
        let mut frame = vec![0u8; FRAME_BYTES];
        let mut index = 0usize;

        loop {
            match output.read_exact(&mut frame).await {
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    warn!("motion decode read error: {e}");
                    report.decode_failed = true;
                    break;
                }
            }
            if let Some(magnitude) = strategy.feed(&frame) {
                report.frames.push(MotionFrame { index, magnitude });
            }
            index += 1;
        }

        let _ = writer.await;

        match process.wait().await {
            Ok(true) => {}
            Ok(false) => {
                warn!(segment = segment.id(), "motion decode exited abnormally");
                report.decode_failed = true;
            }
            Err(e) => {
                warn!("motion decode wait failed: {e:#}");
                report.decode_failed = true;
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::Utc;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::Mutex;

    use crate::source::SourceProcess;

    fn segment() -> Segment {
        Segment {
            start: Utc::now(),
            data: Bytes::from_static(b"ts-bytes"),
            frames: 2,
        }
    }

    struct FakeProcess {
        clean: bool,
    }

    #[async_trait]
    impl SourceProcess for FakeProcess {
        async fn wait(&mut self) -> anyhow::Result<bool> {
            Ok(self.clean)
        }
        async fn kill(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    /// Serves pre-baked decoder output frames, discarding input.
    struct FakeDecode {
        frames: Mutex<Vec<Vec<u8>>>,
        clean_exit: bool,
    }

    #[async_trait]
    impl DecodeLauncher for FakeDecode {
        async fn launch(&self) -> anyhow::Result<DecodeHandle> {
            let frames = self.frames.lock().await.clone();
            let (input, sink) = tokio::io::duplex(64 * 1024);
            let (mut feed, output) = tokio::io::duplex(FRAME_BYTES * 16);

            tokio::spawn(async move {
                // drain whatever the detector writes
                let mut sink = sink;
                let mut buf = [0u8; 4096];
                while let Ok(n) = tokio::io::AsyncReadExt::read(&mut sink, &mut buf).await {
                    if n == 0 {
                        break;
                    }
                }
            });
            tokio::spawn(async move {
                for f in frames {
                    if feed.write_all(&f).await.is_err() {
                        return;
                    }
                }
                let _ = feed.shutdown().await;
            });

            Ok(DecodeHandle {
                input: Box::new(input),
                output: Box::new(output),
                process: Box::new(FakeProcess {
                    clean: self.clean_exit,
                }),
            })
        }
    }

    fn detector(frames: Vec<Vec<u8>>, clean_exit: bool) -> MotionDetector {
        MotionDetector::new(
            Arc::new(FakeDecode {
                frames: Mutex::new(frames),
                clean_exit,
            }),
            MotionConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_identical_frames_no_motion() {
        let frame = vec![50u8; FRAME_BYTES];
        let d = detector(vec![frame.clone(), frame.clone(), frame], true);
        let report = d.detect(&segment()).await.unwrap();
        assert!(report.frames.is_empty());
        assert!(!report.has_motion());
        assert!(!report.decode_failed);
    }

    #[tokio::test]
    async fn test_changing_frames_flag_motion() {
        // alternating brightness: every scored frame flips by 307200
        let a = vec![0u8; FRAME_BYTES];
        let b = vec![1u8; FRAME_BYTES];
        let d = detector(vec![a.clone(), b.clone(), a, b], true);
        let report = d.detect(&segment()).await.unwrap();
        assert_eq!(report.frames.len(), 3);
        assert!(report.has_motion());
        assert_eq!(report.best().unwrap().magnitude, FRAME_BYTES as u64);
        // indices follow the decoded stream, first frame only primes
        assert_eq!(report.frames[0].index, 1);
    }

    #[tokio::test]
    async fn test_single_flagged_frame_is_noise() {
        let a = vec![0u8; FRAME_BYTES];
        let b = vec![1u8; FRAME_BYTES];
        let d = detector(vec![a, b], true);
        let report = d.detect(&segment()).await.unwrap();
        assert_eq!(report.frames.len(), 1);
        assert!(!report.has_motion());
    }

    #[tokio::test]
    async fn test_abnormal_exit_keeps_partial_results() {
        let a = vec![0u8; FRAME_BYTES];
        let b = vec![1u8; FRAME_BYTES];
        let d = detector(vec![a.clone(), b, a], false);
        let report = d.detect(&segment()).await.unwrap();
        assert!(report.decode_failed);
        assert_eq!(report.frames.len(), 2);
    }

    #[tokio::test]
    async fn test_truncated_last_frame_ignored() {
        let a = vec![0u8; FRAME_BYTES];
        let b = vec![1u8; FRAME_BYTES];
        let partial = vec![9u8; 100];
        let d = detector(vec![a, b, partial], true);
        let report = d.detect(&segment()).await.unwrap();
        assert_eq!(report.frames.len(), 1);
        assert!(!report.decode_failed);
    }
}
