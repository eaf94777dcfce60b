//! Minimal configuration loading for Lookout.
//!
//! This crate provides configuration loading with minimal dependencies,
//! so both the daemon and any future tooling can share one config
//! surface without dragging in the runtime stack.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/lookout/config.toml` (system)
//! 2. `~/.config/lookout/config.toml` (user)
//! 3. `./lookout.toml` (local override)
//! 4. Environment variables (`LOOKOUT_*`)
//!
//! # Example Config
//!
//! ```toml
//! [capture]
//! ffmpeg_path = "/usr/bin/ffmpeg"
//! device = "/dev/video0"
//! segment_secs = 10
//! ring_capacity = 3
//!
//! [motion]
//! strategy = "intensity-delta"
//!
//! [storage]
//! archive_dir = "/var/lib/lookout/segments"
//!
//! [notify]
//! webhook_url = "https://example.com/hook"
//! camera_name = "front-door"
//!
//! [serve]
//! listen_addr = "0.0.0.0:8080"
//!
//! [presence]
//! probe_addrs = ["192.168.1.20:62078"]
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files, discover_config_files_with_override, ConfigSources};
pub use sections::{
    CaptureConfig, MotionConfig, NotifyConfig, PresenceConfig, ServeConfig, StorageConfig,
    TelemetryConfig,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete Lookout configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LookoutConfig {
    /// Capture source: ffmpeg path, device, segmenting knobs.
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Motion detection strategy and thresholds.
    #[serde(default)]
    pub motion: MotionConfig,

    /// Local segment archival.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Motion notification webhook.
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Live HTTP serving.
    #[serde(default)]
    pub serve: ServeConfig,

    /// Presence probing (suppresses notifications when someone is home).
    #[serde(default)]
    pub presence: PresenceConfig,

    /// Logging settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl LookoutConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/lookout/config.toml`
    /// 3. `~/.config/lookout/config.toml`
    /// 4. `./lookout.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./lookout.toml` override. System and user configs still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = LookoutConfig::default();

        // Load config files in order
        for path in loader::discover_config_files_with_override(config_path) {
            let file_config = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, file_config);
            sources.files.push(path);
        }

        // Apply environment variable overrides
        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        // Build TOML manually for nicer formatting
        let mut output = String::new();

        output.push_str("# Lookout Configuration\n\n");

        output.push_str("[capture]\n");
        output.push_str(&format!("ffmpeg_path = \"{}\"\n", self.capture.ffmpeg_path));
        output.push_str(&format!("device = \"{}\"\n", self.capture.device));
        output.push_str(&format!("segment_secs = {}\n", self.capture.segment_secs));
        output.push_str(&format!(
            "ring_capacity = {}\n",
            self.capture.ring_capacity
        ));

        output.push_str("\n[motion]\n");
        output.push_str(&format!("strategy = \"{}\"\n", self.motion.strategy));
        output.push_str(&format!("threshold = {}\n", self.motion.threshold));
        output.push_str(&format!("noise_filter = {}\n", self.motion.noise_filter));

        output.push_str("\n[storage]\n");
        if let Some(dir) = &self.storage.archive_dir {
            output.push_str(&format!("archive_dir = \"{}\"\n", dir.display()));
        }

        output.push_str("\n[notify]\n");
        if let Some(url) = &self.notify.webhook_url {
            output.push_str(&format!("webhook_url = \"{}\"\n", url));
        }
        output.push_str(&format!("camera_name = \"{}\"\n", self.notify.camera_name));

        output.push_str("\n[serve]\n");
        if let Some(addr) = &self.serve.listen_addr {
            output.push_str(&format!("listen_addr = \"{}\"\n", addr));
        }

        output.push_str("\n[presence]\n");
        output.push_str("probe_addrs = [\n");
        for addr in &self.presence.probe_addrs {
            output.push_str(&format!("    \"{}\",\n", addr));
        }
        output.push_str("]\n");
        output.push_str(&format!(
            "interval_secs = {}\n",
            self.presence.interval_secs
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LookoutConfig::default();
        assert_eq!(config.capture.device, "/dev/video0");
        assert_eq!(config.capture.segment_secs, 10);
        assert_eq!(config.capture.ring_capacity, 3);
        assert_eq!(config.motion.strategy, "intensity-delta");
    }

    #[test]
    fn test_to_toml() {
        let config = LookoutConfig::default();
        let toml = config.to_toml();
        assert!(toml.contains("[capture]"));
        assert!(toml.contains("[motion]"));
        assert!(toml.contains("[presence]"));
        assert!(toml.contains("intensity-delta"));
    }

    #[test]
    fn test_load_defaults() {
        // Load should work even with no config files
        let config = LookoutConfig::load().unwrap();
        assert_eq!(config.capture.ffmpeg_path, "ffmpeg");
    }
}
