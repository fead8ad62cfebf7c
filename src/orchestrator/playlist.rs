//! Playlist expansion: turning one playlist URL into individual jobs.
//!
//! Expansion streams the downloader's flat-playlist listing and enqueues a
//! job per entry as it arrives, so early entries start downloading while
//! later ones are still being listed. Every expanded request shares one
//! cancellation token; cancelling it stops the listing, the running member,
//! and every member still pending.

use super::MediaDownloader;
use crate::classifier;
use crate::error::{Error, Result};
use crate::process::{read_lines_lossy, resolve_tool, spawn_downloader, terminate_and_reap};
use crate::types::{BatchCounters, DownloadRequest, Event, FormatSelection, MediaKind};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Fields of one flat-playlist listing line we use
#[derive(Debug, Deserialize)]
struct PlaylistEntry {
    url: Option<String>,
    webpage_url: Option<String>,
    title: Option<String>,
}

impl PlaylistEntry {
    fn entry_url(&self) -> Option<&str> {
        self.url.as_deref().or(self.webpage_url.as_deref())
    }
}

impl MediaDownloader {
    /// Expand a playlist URL into individual jobs.
    ///
    /// Returns the batch cancellation token as soon as the listing process
    /// has launched; entries are enqueued in the background as the listing
    /// streams in, with a [`Event::BatchProgress`] per entry. Listing
    /// failures surface as an error log line, never as a panic.
    pub async fn expand_playlist(
        &self,
        url: &str,
        kind: MediaKind,
    ) -> Result<CancellationToken> {
        if !self
            .queue_state
            .accepting_new
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(Error::ShuttingDown);
        }

        let config = self.get_config();
        let binary = resolve_tool(
            config.tools.ytdlp_path.as_deref(),
            "yt-dlp",
            config.tools.search_path,
        )?;
        let args = vec![
            "--flat-playlist".to_string(),
            "--dump-json".to_string(),
            url.to_string(),
        ];
        let mut child = spawn_downloader(&binary, &args)?;
        let Some(stdout) = child.stdout.take() else {
            return Err(Error::Launch("listing stdout pipe missing".to_string()));
        };
        let Some(stderr) = child.stderr.take() else {
            return Err(Error::Launch("listing stderr pipe missing".to_string()));
        };

        // A new batch starts now; counters from the previous one are stale.
        self.queue_state.inner.lock().await.batch = BatchCounters::default();

        let token = CancellationToken::new();
        info!(url, "playlist expansion started");

        let downloader = self.clone();
        let batch_token = token.clone();
        let playlist_url = url.to_string();
        tokio::spawn(async move {
            let fetched = Arc::new(AtomicUsize::new(0));
            let stderr_lines = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));

            let stderr_sink = Arc::clone(&stderr_lines);
            let stderr_reader = tokio::spawn(async move {
                read_lines_lossy(stderr, move |line| {
                    if let Ok(mut lines) = stderr_sink.lock() {
                        lines.push(line);
                    }
                    std::future::ready(())
                })
                .await;
            });

            let pump = async {
                let downloader = &downloader;
                let fetched = &fetched;
                let batch_token = &batch_token;
                read_lines_lossy(stdout, move |line| async move {
                    let Ok(entry) = serde_json::from_str::<PlaylistEntry>(&line) else {
                        return;
                    };
                    let Some(entry_url) = entry.entry_url().map(str::to_string) else {
                        return;
                    };
                    let title = entry.title.unwrap_or_else(|| entry_url.clone());
                    let request = DownloadRequest {
                        url: entry_url,
                        kind,
                        format: FormatSelection::Default,
                        subtitles: downloader.config.subtitles.clone(),
                        playlist_member: true,
                        title,
                        cancel: batch_token.child_token(),
                    };
                    match downloader.enqueue(request).await {
                        Ok(_) => {
                            let count = fetched.fetch_add(1, Ordering::SeqCst) + 1;
                            downloader
                                .emit(Event::BatchProgress { fetched: count })
                                .await;
                        }
                        Err(e) => {
                            warn!(error = %e, "could not enqueue playlist entry");
                        }
                    }
                })
                .await;
            };

            let mut cancelled = false;
            tokio::select! {
                () = pump => {}
                _ = batch_token.cancelled() => {
                    cancelled = true;
                }
            }

            if cancelled {
                info!(url = %playlist_url, "playlist expansion cancelled");
                terminate_and_reap(
                    &mut child,
                    downloader.config.limits.terminate_grace,
                    downloader.config.limits.kill_wait,
                )
                .await;
                stderr_reader.abort();
                return;
            }

            let status = child.wait().await;
            let _ = tokio::time::timeout(
                downloader.config.limits.reader_join_timeout,
                stderr_reader,
            )
            .await;

            let total = fetched.load(Ordering::SeqCst);
            let succeeded = status.map(|s| s.success()).unwrap_or(false);
            if total == 0 {
                let diagnostics = stderr_lines
                    .lock()
                    .map(|lines| lines.clone())
                    .unwrap_or_default();
                let message = classifier::classify(&diagnostics).unwrap_or_else(|| {
                    if succeeded {
                        "The playlist contained no downloadable entries.".to_string()
                    } else {
                        "Playlist listing failed. Check the log for details.".to_string()
                    }
                });
                error!(url = %playlist_url, reason = %message, "playlist expansion produced no jobs");
                downloader.emit_log(format!("Playlist expansion failed: {message}"));
            } else {
                info!(url = %playlist_url, entries = total, "playlist expansion finished");
            }
        });

        Ok(token)
    }
}
