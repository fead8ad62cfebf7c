//! Queue management: enqueueing, cancellation, shutdown, and advancement.
//!
//! The queue is strictly ordered and strictly serial: at most one job runs
//! at any moment, and the next pending request starts only after the current
//! job has reported its terminal status.

use super::{ActiveJob, MediaDownloader, QueueInner};
use crate::error::{Error, Result};
use crate::types::{BatchCounters, DownloadRequest, Event, JobId, TerminalStatus};
use chrono::Utc;
use std::sync::atomic::Ordering;
use tracing::{debug, info};

impl MediaDownloader {
    /// Accept a download request and assign it a job id.
    ///
    /// The request joins the back of the pending queue; it starts immediately
    /// when nothing else is running. Refused once shutdown has begun.
    pub async fn enqueue(&self, request: DownloadRequest) -> Result<JobId> {
        if !self.queue_state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let id = self.allocate_job_id();
        info!(job_id = %id, url = %request.url, "request accepted");

        let added = Event::JobAdded {
            id,
            url: request.url.clone(),
            title: request.title.clone(),
            kind: request.kind,
            platform: request.platform(),
            playlist_member: request.playlist_member,
        };

        {
            let mut inner = self.queue_state.inner.lock().await;
            inner.pending.push_back((id, request));
        }
        self.emit(added).await;
        self.try_start_next().await;
        Ok(id)
    }

    /// Cancel a job by id.
    ///
    /// A running job gets its token cancelled and reports `Cancelled` once
    /// the process has actually exited. A pending job is removed without ever
    /// launching and reports `Cancelled` immediately. Returns false when the
    /// id is neither running nor pending.
    pub async fn cancel(&self, id: JobId) -> bool {
        let removed = {
            let mut inner = self.queue_state.inner.lock().await;
            if let Some(active) = &inner.active {
                if active.id == id {
                    info!(job_id = %id, "cancelling running job");
                    active.cancel.cancel();
                    return true;
                }
            }
            let position = inner.pending.iter().position(|(pid, _)| *pid == id);
            let removed = position.and_then(|pos| inner.pending.remove(pos));
            if let Some((_, request)) = &removed {
                record_terminal(&mut inner, TerminalStatus::Cancelled, request.playlist_member);
            }
            removed
        };

        match removed {
            Some((id, request)) => {
                info!(job_id = %id, "cancelled pending job before launch");
                self.emit(Event::JobTerminal {
                    id,
                    status: TerminalStatus::Cancelled,
                    message: "Download cancelled by user.".to_string(),
                    file_path: None,
                    thumbnail_path: None,
                    subtitles: false,
                    finished_at: Utc::now(),
                })
                .await;
                // A shared batch token must survive a targeted cancel of one
                // member, so only a request-private token is cancelled here.
                if !request.playlist_member {
                    request.cancel.cancel();
                }
                true
            }
            None => false,
        }
    }

    /// Stop accepting new requests, drop the pending queue, and cancel the
    /// running job.
    ///
    /// Each dropped pending request still reports a `Cancelled` terminal
    /// event; the running job reports its own once the process exits.
    pub async fn shutdown(&self) {
        self.queue_state.accepting_new.store(false, Ordering::SeqCst);
        let drained = {
            let mut inner = self.queue_state.inner.lock().await;
            if let Some(active) = &inner.active {
                info!(job_id = %active.id, "shutdown: cancelling running job");
                active.cancel.cancel();
            }
            let drained = inner.pending.drain(..).collect::<Vec<_>>();
            for (_, request) in &drained {
                record_terminal(&mut inner, TerminalStatus::Cancelled, request.playlist_member);
            }
            drained
        };
        info!(dropped = drained.len(), "shutdown: pending queue drained");
        for (id, _request) in drained {
            self.emit(Event::JobTerminal {
                id,
                status: TerminalStatus::Cancelled,
                message: "Cancelled by shutdown.".to_string(),
                file_path: None,
                thumbnail_path: None,
                subtitles: false,
                finished_at: Utc::now(),
            })
            .await;
        }
    }

    /// Terminal counters for the current playlist batch
    pub async fn batch_counters(&self) -> BatchCounters {
        self.queue_state.inner.lock().await.batch
    }

    /// Record a finished job and advance the queue.
    ///
    /// Pending requests whose shared token was cancelled while this job ran
    /// are dropped here without terminal events; they never became visible
    /// work (see [`MediaDownloader::expand_playlist`]).
    pub(crate) async fn on_job_terminal(
        &self,
        id: JobId,
        status: TerminalStatus,
        playlist_member: bool,
    ) {
        {
            let mut inner = self.queue_state.inner.lock().await;
            if inner.active.as_ref().is_some_and(|a| a.id == id) {
                inner.active = None;
            }
            record_terminal(&mut inner, status, playlist_member);
            let before = inner.pending.len();
            inner
                .pending
                .retain(|(_, request)| !request.cancel.is_cancelled());
            let dropped = before - inner.pending.len();
            if dropped > 0 {
                debug!(dropped, "dropped batch-cancelled pending requests");
            }
        }
        self.try_start_next().await;
    }

    /// Start the next pending job when nothing is running.
    ///
    /// The single-active invariant lives here: `active` is claimed under the
    /// same lock that pops the queue.
    pub(crate) async fn try_start_next(&self) {
        let started = {
            let mut inner = self.queue_state.inner.lock().await;
            if inner.active.is_some() {
                return;
            }
            loop {
                let Some((id, request)) = inner.pending.pop_front() else {
                    break None;
                };
                if request.cancel.is_cancelled() {
                    debug!(job_id = %id, "skipping cancelled pending request");
                    continue;
                }
                inner.active = Some(ActiveJob {
                    id,
                    cancel: request.cancel.clone(),
                });
                break Some((id, request));
            }
        };

        if let Some((id, request)) = started {
            debug!(job_id = %id, "starting job");
            super::job_task::spawn_job_task(self.clone(), id, request);
        }
    }
}

/// Update batch counters for a published terminal event.
///
/// Every path that publishes a `JobTerminal` for a batch member goes through
/// here, whether the job ran or was removed while pending. A standalone
/// terminal marks the batch as over and resets the counters.
fn record_terminal(inner: &mut QueueInner, status: TerminalStatus, playlist_member: bool) {
    if playlist_member {
        match status {
            TerminalStatus::Completed => inner.batch.completed += 1,
            TerminalStatus::Failed => inner.batch.failed += 1,
            TerminalStatus::Cancelled => inner.batch.cancelled += 1,
        }
        debug!(
            completed = inner.batch.completed,
            failed = inner.batch.failed,
            cancelled = inner.batch.cancelled,
            "batch counters updated"
        );
    } else {
        inner.batch = BatchCounters::default();
    }
}
