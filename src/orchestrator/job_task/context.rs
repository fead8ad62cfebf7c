//! Shared per-job state for the job task and its stream readers.

use crate::interpreter::{OutputInterpreter, Parsed, StreamKind};
use crate::orchestrator::MediaDownloader;
use crate::types::{DownloadRequest, Event, JobId, TerminalStatus};
use std::path::PathBuf;

/// State shared between the supervising task and both stream readers
pub(crate) struct JobTaskContext {
    pub(crate) downloader: MediaDownloader,
    pub(crate) id: JobId,
    pub(crate) request: DownloadRequest,
    /// Both readers feed one interpreter, so marker precedence holds across
    /// streams
    pub(crate) interpreter: tokio::sync::Mutex<OutputInterpreter>,
}

impl JobTaskContext {
    pub(crate) fn new(downloader: MediaDownloader, id: JobId, request: DownloadRequest) -> Self {
        let interpreter = OutputInterpreter::new(
            downloader.config.download_dir.clone(),
            downloader.config.limits.diagnostic_buffer_lines,
        );
        Self {
            downloader,
            id,
            request,
            interpreter: tokio::sync::Mutex::new(interpreter),
        }
    }

    /// Process one line of downloader output: forward it to the log, feed the
    /// interpreter, and emit any structured event it produced.
    pub(crate) async fn handle_line(&self, line: String, stream: StreamKind) {
        self.downloader
            .emit_log(format!("[{}] {}", stream.label(), line));
        let parsed = self.interpreter.lock().await.interpret(&line, stream);
        match parsed {
            Parsed::Metadata { title } => {
                self.downloader
                    .emit(Event::JobMetadata { id: self.id, title })
                    .await;
            }
            Parsed::Progress(progress) => {
                self.downloader
                    .emit(Event::JobProgress {
                        id: self.id,
                        percent: progress.percent,
                        speed: progress.speed,
                        eta: progress.eta,
                    })
                    .await;
            }
            Parsed::None => {}
        }
    }
}

/// Everything a finished job reports in its terminal event
pub(crate) struct JobOutcome {
    pub(crate) status: TerminalStatus,
    pub(crate) message: String,
    pub(crate) file_path: Option<PathBuf>,
    pub(crate) thumbnail_path: Option<PathBuf>,
    pub(crate) subtitles: bool,
}

impl JobOutcome {
    pub(crate) fn failed(message: impl Into<String>) -> Self {
        Self {
            status: TerminalStatus::Failed,
            message: message.into(),
            file_path: None,
            thumbnail_path: None,
            subtitles: false,
        }
    }

    pub(crate) fn cancelled() -> Self {
        Self {
            status: TerminalStatus::Cancelled,
            message: "Download cancelled by user.".to_string(),
            file_path: None,
            thumbnail_path: None,
            subtitles: false,
        }
    }
}
