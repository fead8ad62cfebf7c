//! Error types for media-dl
//!
//! All errors that can escape the crate's public API live here. Failures
//! inside a running job never surface as `Error` values — they resolve
//! locally into a single terminal [`Event`](crate::types::Event) instead.

use thiserror::Error;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download_dir")
        key: Option<String>,
    },

    /// External downloader binary could not be resolved or started
    #[error("launch error: {0}")]
    Launch(String),

    /// External tool execution failed (ffmpeg, ffprobe)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, stub implementation)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Shutdown in progress - not accepting new downloads
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// Event channel consumer was already taken
    #[error("event receiver already taken")]
    EventsTaken,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}
