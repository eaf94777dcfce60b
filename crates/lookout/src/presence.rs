//! Presence probing.
//!
//! Periodically probes configured TCP addresses (typically phones on
//! the LAN); if any accepts a connection, someone is home and motion
//! notifications are suppressed. The result is a single shared flag
//! read atomically by the pipeline, so staleness within one probe
//! interval is fine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Shared someone-is-home flag.
#[derive(Clone, Default)]
pub struct PresenceFlag {
    home: Arc<AtomicBool>,
}

impl PresenceFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_home(&self) -> bool {
        self.home.load(Ordering::Relaxed)
    }

    fn set(&self, home: bool) {
        self.home.store(home, Ordering::Relaxed);
    }
}

/// Probe loop. Returns immediately when no addresses are configured.
pub async fn run_probe(
    flag: PresenceFlag,
    addrs: Vec<String>,
    interval: Duration,
    cancel: CancellationToken,
) {
    if addrs.is_empty() {
        return;
    }

    loop {
        let mut home = false;
        for addr in &addrs {
            match tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(addr)).await {
                Ok(Ok(_)) => {
                    debug!(%addr, "presence probe reachable");
                    home = true;
                    break;
                }
                _ => {}
            }
        }
        flag.set(home);

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
