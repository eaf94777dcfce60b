//! Configuration sections, one struct per TOML table.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Capture source configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    /// Path to the ffmpeg binary.
    /// Default: "ffmpeg" (resolved via PATH)
    #[serde(default = "CaptureConfig::default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// Video4Linux device to capture from.
    /// Default: /dev/video0
    #[serde(default = "CaptureConfig::default_device")]
    pub device: String,

    /// Target segment length in seconds. Matches the camera's GOP length.
    /// Default: 10
    #[serde(default = "CaptureConfig::default_segment_secs")]
    pub segment_secs: u64,

    /// How many recent segments the live ring holds.
    /// Default: 3
    #[serde(default = "CaptureConfig::default_ring_capacity")]
    pub ring_capacity: usize,
}

impl CaptureConfig {
    fn default_ffmpeg_path() -> String {
        "ffmpeg".to_string()
    }

    fn default_device() -> String {
        "/dev/video0".to_string()
    }

    fn default_segment_secs() -> u64 {
        10
    }

    fn default_ring_capacity() -> usize {
        3
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: Self::default_ffmpeg_path(),
            device: Self::default_device(),
            segment_secs: Self::default_segment_secs(),
            ring_capacity: Self::default_ring_capacity(),
        }
    }
}

/// Motion detection configuration.
///
/// `strategy` selects the detection algorithm:
/// - `intensity-delta`: whole-frame summed-intensity difference (default)
/// - `sign-change`: per-pixel sign-change filtering over a short window
/// - `block`: block-partitioned thresholding with a minimum-active-blocks rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MotionConfig {
    /// Detection strategy name.
    #[serde(default = "MotionConfig::default_strategy")]
    pub strategy: String,

    /// Whole-frame intensity-delta threshold (intensity-delta strategy).
    /// Tuned for 640x480 8-bit grayscale.
    #[serde(default = "MotionConfig::default_threshold")]
    pub threshold: u64,

    /// Minimum active pixels to flag a frame (sign-change strategy).
    #[serde(default = "MotionConfig::default_min_active_pixels")]
    pub min_active_pixels: usize,

    /// Block edge length in pixels (block strategy).
    #[serde(default = "MotionConfig::default_block_size")]
    pub block_size: usize,

    /// Per-block difference threshold (block strategy).
    #[serde(default = "MotionConfig::default_block_threshold")]
    pub block_threshold: u64,

    /// Minimum active blocks to flag a frame (block strategy).
    #[serde(default = "MotionConfig::default_min_active_blocks")]
    pub min_active_blocks: usize,

    /// Enable noise suppression (hqdn3d prefilter plus per-strategy gating).
    #[serde(default)]
    pub noise_filter: bool,
}

impl MotionConfig {
    fn default_strategy() -> String {
        "intensity-delta".to_string()
    }

    fn default_threshold() -> u64 {
        20_000
    }

    fn default_min_active_pixels() -> usize {
        1000
    }

    fn default_block_size() -> usize {
        32
    }

    fn default_block_threshold() -> u64 {
        500
    }

    fn default_min_active_blocks() -> usize {
        3
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            strategy: Self::default_strategy(),
            threshold: Self::default_threshold(),
            min_active_pixels: Self::default_min_active_pixels(),
            block_size: Self::default_block_size(),
            block_threshold: Self::default_block_threshold(),
            min_active_blocks: Self::default_min_active_blocks(),
            noise_filter: false,
        }
    }
}

/// Local segment archival.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StorageConfig {
    /// Directory to write each completed segment to as `<id>.ts`.
    /// Unset disables archival.
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,
}

/// Motion notification webhook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotifyConfig {
    /// Webhook URL to POST motion summaries to. Unset disables notification.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Camera name included in notifications.
    /// Default: "lookout"
    #[serde(default = "NotifyConfig::default_camera_name")]
    pub camera_name: String,
}

impl NotifyConfig {
    fn default_camera_name() -> String {
        "lookout".to_string()
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            camera_name: Self::default_camera_name(),
        }
    }
}

/// Live HTTP serving.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ServeConfig {
    /// Address to bind the live-view HTTP server to, e.g. "0.0.0.0:8080".
    /// Unset disables the server.
    #[serde(default)]
    pub listen_addr: Option<String>,
}

/// Presence probing.
///
/// When any probe address is reachable, someone is considered home and
/// motion notifications are suppressed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresenceConfig {
    /// TCP addresses (host:port) to probe, typically phones on the LAN.
    /// Empty disables the probe.
    #[serde(default)]
    pub probe_addrs: Vec<String>,

    /// Probe interval in seconds.
    /// Default: 60
    #[serde(default = "PresenceConfig::default_interval_secs")]
    pub interval_secs: u64,
}

impl PresenceConfig {
    fn default_interval_secs() -> u64 {
        60
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            probe_addrs: Vec::new(),
            interval_secs: Self::default_interval_secs(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryConfig {
    /// Log level (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_defaults() {
        let capture = CaptureConfig::default();
        assert_eq!(capture.ffmpeg_path, "ffmpeg");
        assert_eq!(capture.device, "/dev/video0");
        assert_eq!(capture.segment_secs, 10);
        assert_eq!(capture.ring_capacity, 3);
    }

    #[test]
    fn test_motion_defaults() {
        let motion = MotionConfig::default();
        assert_eq!(motion.strategy, "intensity-delta");
        assert_eq!(motion.threshold, 20_000);
        assert_eq!(motion.block_size, 32);
        assert!(!motion.noise_filter);
    }

    #[test]
    fn test_presence_defaults() {
        let presence = PresenceConfig::default();
        assert!(presence.probe_addrs.is_empty());
        assert_eq!(presence.interval_secs, 60);
    }
}
