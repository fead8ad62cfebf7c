//! Launch, supervision, and terminal computation for one job.
//!
//! The phases run in order: resolve the binary, spawn the process, attach
//! one reader per stream, supervise until exit or cancellation, reap, join
//! the readers, then compute exactly one terminal outcome. Cancellation wins
//! every race against process exit.

use super::context::{JobOutcome, JobTaskContext};
use super::finalization;
use crate::classifier;
use crate::command::build_args;
use crate::interpreter::StreamKind;
use crate::orchestrator::MediaDownloader;
use crate::process::{read_lines_lossy, resolve_tool, spawn_downloader, terminate_and_reap};
use crate::types::{DownloadRequest, Event, JobId, TerminalStatus};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Run one job to completion in the background.
///
/// The actual work runs in an inner task so that a panic anywhere in the job
/// pipeline still produces a terminal event and releases the active slot.
pub(crate) fn spawn_job_task(downloader: MediaDownloader, id: JobId, request: DownloadRequest) {
    tokio::spawn(async move {
        let playlist_member = request.playlist_member;
        let inner = tokio::spawn(run_job_task(downloader.clone(), id, request));
        let outcome = match inner.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(job_id = %id, error = %e, "job task aborted unexpectedly");
                JobOutcome::failed("Internal error: download task aborted unexpectedly.")
            }
        };

        let status = outcome.status;
        info!(job_id = %id, ?status, message = %outcome.message, "job finished");
        downloader
            .emit(Event::JobTerminal {
                id,
                status,
                message: outcome.message,
                file_path: outcome.file_path,
                thumbnail_path: outcome.thumbnail_path,
                subtitles: outcome.subtitles,
                finished_at: Utc::now(),
            })
            .await;
        downloader.on_job_terminal(id, status, playlist_member).await;
    });
}

async fn run_job_task(downloader: MediaDownloader, id: JobId, request: DownloadRequest) -> JobOutcome {
    let cancel = request.cancel.clone();
    if cancel.is_cancelled() {
        return JobOutcome::cancelled();
    }

    let config = downloader.get_config();
    let binary = match resolve_tool(
        config.tools.ytdlp_path.as_deref(),
        "yt-dlp",
        config.tools.search_path,
    ) {
        Ok(binary) => binary,
        Err(e) => return JobOutcome::failed(format!("Could not launch downloader: {e}")),
    };

    let args = build_args(&request, &config);
    debug!(job_id = %id, ?args, "launching downloader");
    let mut child = match spawn_downloader(&binary, &args) {
        Ok(child) => child,
        Err(e) => return JobOutcome::failed(format!("Could not launch downloader: {e}")),
    };
    let Some(stdout) = child.stdout.take() else {
        return JobOutcome::failed("Could not launch downloader: stdout pipe missing.");
    };
    let Some(stderr) = child.stderr.take() else {
        return JobOutcome::failed("Could not launch downloader: stderr pipe missing.");
    };

    let ctx = Arc::new(JobTaskContext::new(downloader.clone(), id, request));

    let stdout_ctx = Arc::clone(&ctx);
    let stdout_reader = tokio::spawn(async move {
        read_lines_lossy(stdout, move |line| {
            let ctx = Arc::clone(&stdout_ctx);
            async move { ctx.handle_line(line, StreamKind::Stdout).await }
        })
        .await;
    });
    let stderr_ctx = Arc::clone(&ctx);
    let stderr_reader = tokio::spawn(async move {
        read_lines_lossy(stderr, move |line| {
            let ctx = Arc::clone(&stderr_ctx);
            async move { ctx.handle_line(line, StreamKind::Stderr).await }
        })
        .await;
    });

    let mut was_cancelled = false;
    let mut exit_status = None;
    tokio::select! {
        status = child.wait() => {
            exit_status = status.ok();
        }
        _ = cancel.cancelled() => {
            was_cancelled = true;
        }
    }
    if was_cancelled {
        info!(job_id = %id, "cancellation observed, terminating downloader");
        terminate_and_reap(
            &mut child,
            config.limits.terminate_grace,
            config.limits.kill_wait,
        )
        .await;
    }

    // Readers drain whatever the pipes still hold after exit; a stuck reader
    // is abandoned rather than wedging the terminal event.
    join_reader(stdout_reader, &config, "stdout").await;
    join_reader(stderr_reader, &config, "stderr").await;

    if was_cancelled || cancel.is_cancelled() {
        return JobOutcome::cancelled();
    }

    let (diagnostics, resolved_path) = {
        let interp = ctx.interpreter.lock().await;
        (
            interp.diagnostics(),
            interp.resolved_path().map(PathBuf::from),
        )
    };

    match exit_status {
        Some(status) if status.success() => {
            let path = match resolved_path {
                Some(path) if tokio::fs::try_exists(&path).await.unwrap_or(false) => path,
                _ => {
                    return JobOutcome::failed(
                        "Download finished but the output file was not found on disk.",
                    );
                }
            };
            let (thumbnail_path, subtitles) =
                finalization::finalize_job(downloader.artwork.as_ref(), &ctx.request, &path)
                    .await;
            JobOutcome {
                status: TerminalStatus::Completed,
                message: "Download completed.".to_string(),
                file_path: Some(path),
                thumbnail_path,
                subtitles,
            }
        }
        Some(status) => {
            let message = classifier::classify(&diagnostics).unwrap_or_else(|| match status
                .code()
            {
                Some(code) => format!("Download failed with exit code {code}."),
                None => "Download failed: process terminated by signal.".to_string(),
            });
            JobOutcome::failed(message)
        }
        None => JobOutcome::failed("Download failed: process exit status unknown."),
    }
}

async fn join_reader(handle: JoinHandle<()>, config: &crate::config::Config, stream: &str) {
    let mut handle = handle;
    if tokio::time::timeout(config.limits.reader_join_timeout, &mut handle)
        .await
        .is_err()
    {
        warn!(stream, "stream reader did not finish in time, aborting it");
        handle.abort();
        // The reader may be mid-emit; wait for the abort to land so nothing
        // can be sent after the terminal event.
        let _ = handle.await;
    }
}
