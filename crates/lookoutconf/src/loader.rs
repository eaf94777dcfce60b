//! Config file discovery, loading, and environment variable overlay.

use crate::sections::{CaptureConfig, MotionConfig, NotifyConfig, PresenceConfig, TelemetryConfig};
use crate::{ConfigError, LookoutConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    // System config
    let system = PathBuf::from("/etc/lookout/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("lookout/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    // CLI override takes precedence over local
    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    // Local override (current directory)
    let local = PathBuf::from("lookout.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load config from a TOML file.
pub fn load_from_file(path: &Path) -> Result<LookoutConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Merge two configs, with `overlay` taking precedence.
///
/// A field wins from the overlay when it differs from the compiled
/// default, so files later in the load order only override what they
/// actually set.
pub fn merge_configs(base: LookoutConfig, overlay: LookoutConfig) -> LookoutConfig {
    let capture_defaults = CaptureConfig::default();
    let motion_defaults = MotionConfig::default();
    let notify_defaults = NotifyConfig::default();
    let presence_defaults = PresenceConfig::default();
    let telemetry_defaults = TelemetryConfig::default();

    LookoutConfig {
        capture: CaptureConfig {
            ffmpeg_path: if overlay.capture.ffmpeg_path != capture_defaults.ffmpeg_path {
                overlay.capture.ffmpeg_path
            } else {
                base.capture.ffmpeg_path
            },
            device: if overlay.capture.device != capture_defaults.device {
                overlay.capture.device
            } else {
                base.capture.device
            },
            segment_secs: if overlay.capture.segment_secs != capture_defaults.segment_secs {
                overlay.capture.segment_secs
            } else {
                base.capture.segment_secs
            },
            ring_capacity: if overlay.capture.ring_capacity != capture_defaults.ring_capacity {
                overlay.capture.ring_capacity
            } else {
                base.capture.ring_capacity
            },
        },
        motion: if overlay.motion != motion_defaults {
            overlay.motion
        } else {
            base.motion
        },
        storage: crate::StorageConfig {
            archive_dir: overlay.storage.archive_dir.or(base.storage.archive_dir),
        },
        notify: NotifyConfig {
            webhook_url: overlay.notify.webhook_url.or(base.notify.webhook_url),
            camera_name: if overlay.notify.camera_name != notify_defaults.camera_name {
                overlay.notify.camera_name
            } else {
                base.notify.camera_name
            },
        },
        serve: crate::ServeConfig {
            listen_addr: overlay.serve.listen_addr.or(base.serve.listen_addr),
        },
        presence: PresenceConfig {
            probe_addrs: if !overlay.presence.probe_addrs.is_empty() {
                overlay.presence.probe_addrs
            } else {
                base.presence.probe_addrs
            },
            interval_secs: if overlay.presence.interval_secs != presence_defaults.interval_secs {
                overlay.presence.interval_secs
            } else {
                base.presence.interval_secs
            },
        },
        telemetry: TelemetryConfig {
            log_level: if overlay.telemetry.log_level != telemetry_defaults.log_level {
                overlay.telemetry.log_level
            } else {
                base.telemetry.log_level
            },
        },
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut LookoutConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("LOOKOUT_FFMPEG_PATH") {
        config.capture.ffmpeg_path = v;
        sources.env_overrides.push("LOOKOUT_FFMPEG_PATH".to_string());
    }
    if let Ok(v) = env::var("LOOKOUT_DEVICE") {
        config.capture.device = v;
        sources.env_overrides.push("LOOKOUT_DEVICE".to_string());
    }
    if let Ok(v) = env::var("LOOKOUT_ARCHIVE_DIR") {
        config.storage.archive_dir = Some(expand_path(&v));
        sources.env_overrides.push("LOOKOUT_ARCHIVE_DIR".to_string());
    }
    if let Ok(v) = env::var("LOOKOUT_WEBHOOK_URL") {
        config.notify.webhook_url = Some(v);
        sources.env_overrides.push("LOOKOUT_WEBHOOK_URL".to_string());
    }
    if let Ok(v) = env::var("LOOKOUT_LISTEN_ADDR") {
        config.serve.listen_addr = Some(v);
        sources.env_overrides.push("LOOKOUT_LISTEN_ADDR".to_string());
    }
    if let Ok(v) = env::var("LOOKOUT_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("LOOKOUT_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Ok(v) = env::var("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_absolute() {
        let expanded = expand_path("/absolute/path");
        assert_eq!(expanded, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files();
    }

    #[test]
    fn test_parse_minimal_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[capture]
device = "/dev/video2"
"#
        )
        .unwrap();

        let config = load_from_file(file.path()).unwrap();
        assert_eq!(config.capture.device, "/dev/video2");
        // Other values should be defaults
        assert_eq!(config.capture.segment_secs, 10);
        assert_eq!(config.capture.ring_capacity, 3);
    }

    #[test]
    fn test_parse_full_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[capture]
ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
device = "/dev/video1"
segment_secs = 6
ring_capacity = 5

[motion]
strategy = "block"
block_size = 16
min_active_blocks = 2
noise_filter = true

[storage]
archive_dir = "/tank/lookout"

[notify]
webhook_url = "https://example.com/hook"
camera_name = "garage"

[serve]
listen_addr = "127.0.0.1:9000"

[presence]
probe_addrs = ["10.0.0.7:62078"]
interval_secs = 30
"#
        )
        .unwrap();

        let config = load_from_file(file.path()).unwrap();
        assert_eq!(config.capture.ffmpeg_path, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(config.capture.device, "/dev/video1");
        assert_eq!(config.capture.segment_secs, 6);
        assert_eq!(config.capture.ring_capacity, 5);
        assert_eq!(config.motion.strategy, "block");
        assert_eq!(config.motion.block_size, 16);
        assert_eq!(config.motion.min_active_blocks, 2);
        assert!(config.motion.noise_filter);
        assert_eq!(config.storage.archive_dir, Some(PathBuf::from("/tank/lookout")));
        assert_eq!(
            config.notify.webhook_url.as_deref(),
            Some("https://example.com/hook")
        );
        assert_eq!(config.notify.camera_name, "garage");
        assert_eq!(config.serve.listen_addr.as_deref(), Some("127.0.0.1:9000"));
        assert_eq!(config.presence.probe_addrs, vec!["10.0.0.7:62078"]);
        assert_eq!(config.presence.interval_secs, 30);
    }

    #[test]
    fn test_parse_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[capture\ndevice=").unwrap();

        let err = load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_merge_overlay_wins() {
        let base = LookoutConfig::default();
        let mut overlay = LookoutConfig::default();
        overlay.capture.device = "/dev/video3".to_string();
        overlay.serve.listen_addr = Some("0.0.0.0:8080".to_string());

        let merged = merge_configs(base, overlay);
        assert_eq!(merged.capture.device, "/dev/video3");
        assert_eq!(merged.serve.listen_addr.as_deref(), Some("0.0.0.0:8080"));
        // Untouched fields keep defaults
        assert_eq!(merged.capture.segment_secs, 10);
    }

    #[test]
    fn test_merge_keeps_base_when_overlay_default() {
        let mut base = LookoutConfig::default();
        base.capture.ffmpeg_path = "/usr/local/bin/ffmpeg".to_string();
        base.notify.camera_name = "porch".to_string();

        let merged = merge_configs(base, LookoutConfig::default());
        assert_eq!(merged.capture.ffmpeg_path, "/usr/local/bin/ffmpeg");
        assert_eq!(merged.notify.camera_name, "porch");
    }
}
