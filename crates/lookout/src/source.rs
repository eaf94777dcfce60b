//! ffmpeg process launching behind injectable traits.
//!
//! The supervisor and motion detector only see `CaptureLauncher` /
//! `DecodeLauncher`, so tests drive them with in-memory streams and
//! scripted exits instead of real processes.

use std::process::Stdio;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::process::{Child, ChildStderr, Command};
use tracing::warn;

// how much trailing stderr to keep for failure logs
const STDERR_TAIL_BYTES: usize = 4096;

/// A running external decoder process.
#[async_trait]
pub trait SourceProcess: Send {
    /// Wait for the process to exit; `true` means a clean exit.
    async fn wait(&mut self) -> anyhow::Result<bool>;

    /// Terminate the process.
    async fn kill(&mut self) -> anyhow::Result<()>;
}

/// A capture process and its packet output stream.
pub struct CaptureHandle {
    pub stream: Box<dyn AsyncRead + Send + Unpin>,
    pub process: Box<dyn SourceProcess>,
}

#[async_trait]
pub trait CaptureLauncher: Send + Sync {
    async fn launch(&self) -> anyhow::Result<CaptureHandle>;
}

/// A re-decode process with both ends of its pipe.
pub struct DecodeHandle {
    pub input: Box<dyn AsyncWrite + Send + Unpin>,
    pub output: Box<dyn AsyncRead + Send + Unpin>,
    pub process: Box<dyn SourceProcess>,
}

#[async_trait]
pub trait DecodeLauncher: Send + Sync {
    async fn launch(&self) -> anyhow::Result<DecodeHandle>;
}

struct ChildProcess {
    child: Child,
    stderr_tail: Option<Arc<Mutex<Vec<u8>>>>,
}

impl ChildProcess {
    fn new(child: Child) -> Self {
        ChildProcess {
            child,
            stderr_tail: None,
        }
    }

    /// Collect the trailing stderr output in the background so it can
    /// be logged if the process dies.
    fn collect_stderr(mut self, stderr: ChildStderr) -> Self {
        let tail = Arc::new(Mutex::new(Vec::new()));
        self.stderr_tail = Some(Arc::clone(&tail));
        tokio::spawn(async move {
            let mut stderr = stderr;
            let mut buf = [0u8; 1024];
            while let Ok(n) = stderr.read(&mut buf).await {
                if n == 0 {
                    break;
                }
                let mut tail = tail.lock().unwrap();
                tail.extend_from_slice(&buf[..n]);
                let len = tail.len();
                if len > STDERR_TAIL_BYTES {
                    tail.drain(..len - STDERR_TAIL_BYTES);
                }
            }
        });
        self
    }
}

#[async_trait]
impl SourceProcess for ChildProcess {
    async fn wait(&mut self) -> anyhow::Result<bool> {
        let status = self.child.wait().await.context("waiting on ffmpeg")?;
        if !status.success() {
            if let Some(tail) = &self.stderr_tail {
                let tail = tail.lock().unwrap();
                if !tail.is_empty() {
                    warn!("ffmpeg stderr tail: {}", String::from_utf8_lossy(&tail));
                }
            }
        }
        Ok(status.success())
    }

    async fn kill(&mut self) -> anyhow::Result<()> {
        self.child.kill().await.context("killing ffmpeg")?;
        Ok(())
    }
}

/// v4l2 h264 capture at 640x480 / 10fps, copied without re-encode into
/// MPEG-TS on stdout.
pub struct FfmpegCapture {
    pub ffmpeg_path: String,
    pub device: String,
}

#[async_trait]
impl CaptureLauncher for FfmpegCapture {
    async fn launch(&self) -> anyhow::Result<CaptureHandle> {
        let mut child = Command::new(&self.ffmpeg_path)
            .args([
                "-f",
                "video4linux2",
                "-r",
                "10",
                "-input_format",
                "h264",
                "-video_size",
                "640x480",
                "-i",
                &self.device,
                "-vcodec",
                "copy",
                "-acodec",
                "copy",
                "-f",
                "mpegts",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {} for {}", self.ffmpeg_path, self.device))?;

        let stdout = child
            .stdout
            .take()
            .context("capture process has no stdout")?;
        let stderr = child
            .stderr
            .take()
            .context("capture process has no stderr")?;

        Ok(CaptureHandle {
            stream: Box::new(stdout),
            process: Box::new(ChildProcess::new(child).collect_stderr(stderr)),
        })
    }
}

/// Edge-detect re-decode: MPEG-TS on stdin, raw 8-bit grayscale frames
/// on stdout. With `noise_filter` a denoise pass runs before edge
/// detection.
pub struct FfmpegEdgeDecode {
    pub ffmpeg_path: String,
    pub noise_filter: bool,
}

#[async_trait]
impl DecodeLauncher for FfmpegEdgeDecode {
    async fn launch(&self) -> anyhow::Result<DecodeHandle> {
        let filters = if self.noise_filter {
            "hqdn3d=4:4:3:3,edgedetect"
        } else {
            "edgedetect"
        };

        let mut child = Command::new(&self.ffmpeg_path)
            .args([
                "-f", "mpegts", "-i", "-", "-vcodec", "rawvideo", "-pix_fmt", "gray", "-vf",
                filters, "-f", "rawvideo", "-",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {} for edge decode", self.ffmpeg_path))?;

        let stdin = child.stdin.take().context("decode process has no stdin")?;
        let stdout = child
            .stdout
            .take()
            .context("decode process has no stdout")?;

        Ok(DecodeHandle {
            input: Box::new(stdin),
            output: Box::new(stdout),
            process: Box::new(ChildProcess::new(child)),
        })
    }
}
