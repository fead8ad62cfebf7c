//! # media-dl
//!
//! Embeddable download-orchestration library for yt-dlp front-ends.
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers receive events, no polling required
//! - **Strictly serial** - One downloader process at a time, from an ordered queue
//! - **Cancellation-aware** - Every job stops cleanly, alone or as a batch
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, DownloadRequest, MediaDownloader, MediaKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         download_dir: "/tmp/media".into(),
//!         ..Default::default()
//!     };
//!
//!     let downloader = MediaDownloader::new(config).await?;
//!
//!     // Consume events (one receiver, taken exactly once)
//!     let mut events = downloader.take_events()?;
//!     tokio::spawn(async move {
//!         while let Some(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let request = DownloadRequest::new("https://youtu.be/abc", MediaKind::Video);
//!     let job = downloader.enqueue(request).await?;
//!     println!("queued job {job}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Failure classification from downloader diagnostics
pub mod classifier;
/// Downloader argument construction
pub mod command;
/// Configuration types
pub mod config;
/// External tool availability checking
pub mod deps;
/// Error types
pub mod error;
/// Per-job output interpretation
pub mod interpreter;
/// Download orchestration (decomposed into focused submodules)
pub mod orchestrator;
/// External process launching and termination
pub mod process;
/// Core types: requests, events, identifiers
pub mod types;

pub use config::{Config, LimitsConfig, ToolsConfig};
pub use deps::{check_dependencies, DependencyReport, ToolStatus};
pub use error::{Error, Result};
pub use orchestrator::{
    ArtworkGenerator, CliArtworkGenerator, MediaDownloader, NoOpArtworkGenerator,
};
pub use types::{
    BatchCounters, DownloadRequest, Event, FormatSelection, JobId, MediaKind, Progress,
    SourcePlatform, SubtitleOptions, TerminalStatus,
};
