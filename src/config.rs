//! Configuration types for media-dl

use crate::error::{Error, Result};
use crate::types::SubtitleOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
///
/// Read-only from the core's perspective: the presentation layer builds one
/// and hands it over at construction time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Directory downloads are written into (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Default subtitle preferences applied to requests built by the core
    /// itself (playlist expansion)
    #[serde(default)]
    pub subtitles: SubtitleOptions,

    /// External tool paths
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Timeouts, buffer caps, and channel sizing
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            subtitles: SubtitleOptions::default(),
            tools: ToolsConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Config {
    /// Validate the configuration, rejecting values the core cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.download_dir.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "download_dir must not be empty".to_string(),
                key: Some("download_dir".to_string()),
            });
        }
        if self.subtitles.enabled && self.subtitles.languages.trim().is_empty() {
            return Err(Error::Config {
                message: "subtitle languages must not be empty when subtitles are enabled"
                    .to_string(),
                key: Some("subtitles.languages".to_string()),
            });
        }
        if self.limits.event_channel_capacity == 0 {
            return Err(Error::Config {
                message: "event_channel_capacity must be at least 1".to_string(),
                key: Some("limits.event_channel_capacity".to_string()),
            });
        }
        if self.limits.diagnostic_buffer_lines == 0 {
            return Err(Error::Config {
                message: "diagnostic_buffer_lines must be at least 1".to_string(),
                key: Some("limits.diagnostic_buffer_lines".to_string()),
            });
        }
        for (key, value) in [
            ("limits.terminate_grace", self.limits.terminate_grace),
            ("limits.kill_wait", self.limits.kill_wait),
            ("limits.reader_join_timeout", self.limits.reader_join_timeout),
            ("limits.tool_timeout", self.limits.tool_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::Config {
                    message: format!("{key} must be non-zero"),
                    key: Some(key.to_string()),
                });
            }
        }
        Ok(())
    }
}

/// External tool paths (yt-dlp, ffmpeg, ffprobe)
///
/// Explicit paths take precedence; unset paths are discovered on PATH when
/// `search_path` is enabled.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Path to the ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Path to the ffprobe executable (auto-detected if None)
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// Whether to search PATH for tools when explicit paths are not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            ffmpeg_path: None,
            ffprobe_path: None,
            search_path: true,
        }
    }
}

/// Timeouts, buffer caps, and channel sizing
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Capacity of the bounded event channel (default: 256)
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// How long a status/progress event producer may block on a full channel
    /// before the event is dropped with an error log (default: 50ms)
    #[serde(default = "default_event_send_timeout")]
    pub event_send_timeout: Duration,

    /// Grace period between graceful terminate and forced kill (default: 5s)
    #[serde(default = "default_terminate_grace")]
    pub terminate_grace: Duration,

    /// How long to wait for the process to die after a forced kill (default: 10s)
    #[serde(default = "default_kill_wait")]
    pub kill_wait: Duration,

    /// How long to wait for a stream reader to finish after process exit;
    /// a non-terminating reader is abandoned, not fatal (default: 5s)
    #[serde(default = "default_reader_join_timeout")]
    pub reader_join_timeout: Duration,

    /// Timeout for bounded helper tools (ffmpeg/ffprobe) during finalization
    /// (default: 30s)
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout: Duration,

    /// Maximum diagnostic lines retained per job for error classification;
    /// oldest lines are evicted past the cap (default: 1000)
    #[serde(default = "default_diagnostic_buffer_lines")]
    pub diagnostic_buffer_lines: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
            event_send_timeout: default_event_send_timeout(),
            terminate_grace: default_terminate_grace(),
            kill_wait: default_kill_wait(),
            reader_join_timeout: default_reader_join_timeout(),
            tool_timeout: default_tool_timeout(),
            diagnostic_buffer_lines: default_diagnostic_buffer_lines(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_true() -> bool {
    true
}

fn default_event_channel_capacity() -> usize {
    256
}

fn default_event_send_timeout() -> Duration {
    Duration::from_millis(50)
}

fn default_terminate_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_kill_wait() -> Duration {
    Duration::from_secs(10)
}

fn default_reader_join_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_tool_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_diagnostic_buffer_lines() -> usize {
    1000
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().expect("defaults must be valid");
    }

    #[test]
    fn empty_download_dir_is_rejected() {
        let config = Config {
            download_dir: PathBuf::new(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(
            err.to_string().contains("download_dir"),
            "error should name the offending key, got: {err}"
        );
    }

    #[test]
    fn enabled_subtitles_require_language_spec() {
        let config = Config {
            subtitles: SubtitleOptions {
                enabled: true,
                languages: "   ".to_string(),
                embed: true,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let config = Config {
            limits: LimitsConfig {
                terminate_grace: Duration::ZERO,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(
            err.to_string().contains("terminate_grace"),
            "error should name the zero timeout, got: {err}"
        );
    }

    #[test]
    fn zero_channel_capacity_is_rejected() {
        let config = Config {
            limits: LimitsConfig {
                event_channel_capacity: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_deserializes_from_partial_json() {
        let config: Config =
            serde_json::from_str(r#"{"download_dir": "/tmp/media"}"#).unwrap();
        assert_eq!(config.download_dir, PathBuf::from("/tmp/media"));
        assert_eq!(
            config.limits.diagnostic_buffer_lines,
            default_diagnostic_buffer_lines(),
            "unspecified fields must take their defaults"
        );
    }
}
