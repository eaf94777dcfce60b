//! lookoutd - unattended camera recorder daemon

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use lookout::archive::SegmentArchive;
use lookout::motion::MotionDetector;
use lookout::notify::{MotionNotifier, WebhookNotifier};
use lookout::pipeline::Pipeline;
use lookout::presence::{self, PresenceFlag};
use lookout::segment::SegmentRing;
use lookout::source::{FfmpegCapture, FfmpegEdgeDecode};
use lookout::supervisor::Supervisor;
use lookout::web;
use lookoutconf::LookoutConfig;

#[derive(Parser)]
#[command(name = "lookoutd", about = "Unattended camera recorder", version)]
struct Args {
    /// Path to config file (overrides ./lookout.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    show_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = LookoutConfig::load_from(args.config.as_deref()).context("loading config")?;

    if args.show_config {
        print!("{}", config.to_toml());
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.telemetry.log_level)),
        )
        .init();

    info!("📷 lookoutd starting, device {}", config.capture.device);

    let shutdown = CancellationToken::new();
    let ring = Arc::new(SegmentRing::new(config.capture.ring_capacity));

    // depth-1 hand-off: the segmenter blocks rather than drop a segment
    let (segment_tx, segment_rx) = mpsc::channel(1);

    let capture = Arc::new(FfmpegCapture {
        ffmpeg_path: config.capture.ffmpeg_path.clone(),
        device: config.capture.device.clone(),
    });
    let supervisor = Supervisor::new(
        capture,
        segment_tx,
        Duration::from_secs(config.capture.segment_secs),
        shutdown.clone(),
    );
    let reset = supervisor.reset_handle();

    let decode = Arc::new(FfmpegEdgeDecode {
        ffmpeg_path: config.capture.ffmpeg_path.clone(),
        noise_filter: config.motion.noise_filter,
    });
    let detector = MotionDetector::new(decode, config.motion.clone());

    let archive = config.storage.archive_dir.clone().map(SegmentArchive::new);
    let notifier = config.notify.webhook_url.clone().map(|url| {
        Arc::new(WebhookNotifier::new(url, config.notify.camera_name.clone()))
            as Arc<dyn MotionNotifier>
    });

    let presence = PresenceFlag::new();
    tokio::spawn(presence::run_probe(
        presence.clone(),
        config.presence.probe_addrs.clone(),
        Duration::from_secs(config.presence.interval_secs),
        shutdown.clone(),
    ));

    if let Some(addr) = config.serve.listen_addr.clone() {
        let ring = Arc::clone(&ring);
        let cancel = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = web::serve(ring, &addr, cancel).await {
                error!("live view server failed: {e:#}");
            }
        });
    }

    let pipeline = Pipeline::new(
        Arc::clone(&ring),
        detector,
        archive,
        notifier,
        presence.clone(),
        reset,
    );
    let pipeline_task = tokio::spawn(pipeline.run(segment_rx, shutdown.clone()));

    let (first_tx, first_rx) = oneshot::channel();
    let supervisor_task = tokio::spawn(supervisor.run(first_tx));

    match first_rx.await {
        Ok(Ok(())) => info!("🎥 capture running"),
        Ok(Err(e)) => {
            shutdown.cancel();
            let _ = pipeline_task.await;
            return Err(e.context("capture startup failed"));
        }
        Err(_) => {
            shutdown.cancel();
            let _ = pipeline_task.await;
            anyhow::bail!("supervisor exited before reporting first launch");
        }
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            shutdown.cancel();
        }
        _ = shutdown.cancelled() => {}
    }

    let supervisor_result = supervisor_task.await;
    let _ = pipeline_task.await;

    match supervisor_result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(e) => Err(anyhow::anyhow!("supervisor task panicked: {e}")),
    }
}
