//! Download orchestration split into focused submodules.
//!
//! The `MediaDownloader` struct and its methods are organized by domain:
//! - [`queue`] - Enqueueing, cancellation, shutdown, and job advancement
//! - [`playlist`] - Playlist expansion into individual jobs
//! - [`job_task`] - Supervision of one downloader invocation
//!
//! One job runs at a time; everything else waits in an ordered pending queue.
//! All observable behavior flows out through a single bounded event channel.

mod job_task;
mod playlist;
mod queue;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use job_task::{ArtworkGenerator, CliArtworkGenerator, NoOpArtworkGenerator};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{BatchCounters, DownloadRequest, Event, JobId};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace};

/// Queue and job state management
#[derive(Clone)]
pub(crate) struct QueueState {
    /// Pending requests and the active job, under one lock so the
    /// single-active invariant cannot race
    pub(crate) inner: Arc<tokio::sync::Mutex<QueueInner>>,
    /// Cleared during shutdown; new requests are refused once false
    pub(crate) accepting_new: Arc<AtomicBool>,
}

/// Everything the queue lock protects
pub(crate) struct QueueInner {
    /// Requests waiting to run, in arrival order
    pub(crate) pending: VecDeque<(JobId, DownloadRequest)>,
    /// The one job allowed to be running, if any
    pub(crate) active: Option<ActiveJob>,
    /// Terminal counters for the current playlist batch
    pub(crate) batch: BatchCounters,
}

/// Bookkeeping for the currently running job
pub(crate) struct ActiveJob {
    pub(crate) id: JobId,
    pub(crate) cancel: CancellationToken,
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MediaDownloader {
    /// Configuration (shared read-only across tasks)
    pub(crate) config: Arc<Config>,
    /// Event channel sender; every producer in the core clones this
    pub(crate) event_tx: tokio::sync::mpsc::Sender<Event>,
    /// Receiver half, handed out once via [`MediaDownloader::take_events`]
    event_rx: Arc<std::sync::Mutex<Option<tokio::sync::mpsc::Receiver<Event>>>>,
    /// Queue and job state
    pub(crate) queue_state: QueueState,
    /// Monotonic job id source
    next_job_id: Arc<AtomicU64>,
    /// Artwork generation backend for finalization (trait object for
    /// pluggable implementations)
    pub(crate) artwork: Arc<dyn ArtworkGenerator>,
}

impl MediaDownloader {
    /// Create a new downloader instance.
    ///
    /// Validates the configuration, creates the download directory, and
    /// selects an artwork backend: the CLI backend when ffmpeg can be
    /// resolved, otherwise a no-op backend that skips artwork generation.
    pub async fn new(config: Config) -> Result<Self> {
        let artwork: Arc<dyn ArtworkGenerator> = match CliArtworkGenerator::detect(&config) {
            Some(cli) => Arc::new(cli),
            None => Arc::new(NoOpArtworkGenerator),
        };
        Self::with_artwork(config, artwork).await
    }

    /// Create a downloader with an explicit artwork backend
    pub async fn with_artwork(
        config: Config,
        artwork: Arc<dyn ArtworkGenerator>,
    ) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "failed to create download directory '{}': {e}",
                        config.download_dir.display()
                    ),
                ))
            })?;

        let (event_tx, event_rx) =
            tokio::sync::mpsc::channel(config.limits.event_channel_capacity);

        let queue_state = QueueState {
            inner: Arc::new(tokio::sync::Mutex::new(QueueInner {
                pending: VecDeque::new(),
                active: None,
                batch: BatchCounters::default(),
            })),
            accepting_new: Arc::new(AtomicBool::new(true)),
        };

        info!(
            download_dir = %config.download_dir.display(),
            artwork = artwork.name(),
            "downloader initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            event_tx,
            event_rx: Arc::new(std::sync::Mutex::new(Some(event_rx))),
            queue_state,
            next_job_id: Arc::new(AtomicU64::new(1)),
            artwork,
        })
    }

    /// Take the event receiver.
    ///
    /// The channel has exactly one consumer; a second call returns
    /// [`Error::EventsTaken`].
    pub fn take_events(&self) -> Result<tokio::sync::mpsc::Receiver<Event>> {
        self.event_rx
            .lock()
            .map_err(|_| Error::Other("event receiver lock poisoned".to_string()))?
            .take()
            .ok_or(Error::EventsTaken)
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Allocate the next job id
    pub(crate) fn allocate_job_id(&self) -> JobId {
        JobId(self.next_job_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Emit a status event, blocking briefly on a full channel.
    ///
    /// Status events are load-bearing for consumers, so a slow consumer gets
    /// a short window to catch up; past that the event is dropped loudly.
    pub(crate) async fn emit(&self, event: Event) {
        let timeout = self.config.limits.event_send_timeout;
        if let Err(e) = self.event_tx.send_timeout(event, timeout).await {
            error!(error = %e, "dropped status event: consumer not keeping up");
        }
    }

    /// Emit a raw log line without blocking; log lines are droppable
    pub(crate) fn emit_log(&self, text: String) {
        if self.event_tx.try_send(Event::LogLine { text }).is_err() {
            trace!("dropped log line: event channel full");
        }
    }
}
