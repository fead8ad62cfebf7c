//! Orchestrator tests driven by a fake downloader script.
//!
//! The fake script keys its behavior off the request URL (the last argument),
//! which lets one binary cover success, failure, hang, and playlist cases.


use crate::config::{Config, ToolsConfig};
use crate::orchestrator::{MediaDownloader, NoOpArtworkGenerator};
use crate::types::{Event, JobId, TerminalStatus};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::Receiver;

/// Fake yt-dlp. `DOWNLOAD_DIR` and `LAUNCH_LOG` are substituted per test.
const FAKE_DOWNLOADER: &str = r#"#!/bin/sh
for url; do :; done
echo "launched $url" >> "LAUNCH_LOG"
case "$url" in
  *plfail*)
    echo "ERROR: This video is not available" 1>&2
    exit 1
    ;;
  *playlist*)
    echo '{"url": "https://example.com/item_a", "title": "Item A"}'
    echo '{"url": "https://example.com/item_b", "title": "Item B"}'
    ;;
  *slow*)
    trap '' TERM
    sleep 30
    ;;
  *fail*)
    echo "ERROR: This video is not available" 1>&2
    exit 1
    ;;
  *nofile*)
    echo '{"title": "Ghost", "_filename": "ghost.mp4"}'
    ;;
  *)
    name=$(basename "$url")
    echo "{\"title\": \"Video $name\", \"_filename\": \"$name.mp4\"}"
    echo "[download]  50.0% of 10.00MiB at 1.00MiB/s ETA 00:05"
    echo "[Merger] Merging formats into \"$name.mp4\""
    : > "DOWNLOAD_DIR/$name.mp4"
    ;;
esac
"#;

/// Build a downloader wired to the fake script, with short reap timeouts
pub(crate) async fn create_test_downloader() -> (MediaDownloader, Receiver<Event>, TempDir) {
    let dir = TempDir::new().expect("create temp dir");
    let download_dir = dir.path().join("downloads");
    std::fs::create_dir_all(&download_dir).expect("create download dir");

    let script_path = dir.path().join("yt-dlp");
    let script = FAKE_DOWNLOADER
        .replace("DOWNLOAD_DIR", &download_dir.to_string_lossy())
        .replace("LAUNCH_LOG", &launch_log_path(&dir).to_string_lossy());
    std::fs::write(&script_path, script).expect("write fake downloader");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755))
            .expect("mark script executable");
    }

    let mut config = Config {
        download_dir,
        ..Default::default()
    };
    config.tools = ToolsConfig {
        ytdlp_path: Some(script_path),
        search_path: false,
        ..Default::default()
    };
    config.limits.terminate_grace = Duration::from_millis(500);
    config.limits.kill_wait = Duration::from_secs(2);
    config.limits.reader_join_timeout = Duration::from_secs(2);

    let downloader = MediaDownloader::with_artwork(config, Arc::new(NoOpArtworkGenerator))
        .await
        .expect("downloader construction");
    let events = downloader.take_events().expect("event receiver");
    (downloader, events, dir)
}

pub(crate) fn launch_log_path(dir: &TempDir) -> PathBuf {
    dir.path().join("launches.log")
}

pub(crate) fn launched_urls(dir: &TempDir) -> String {
    std::fs::read_to_string(launch_log_path(dir)).unwrap_or_default()
}

/// Next event, failing the test on a stuck channel
pub(crate) async fn next_event(events: &mut Receiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(20), events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed unexpectedly")
}

/// Next event that is not a raw log line
pub(crate) async fn next_status_event(events: &mut Receiver<Event>) -> Event {
    loop {
        let event = next_event(events).await;
        if !matches!(event, Event::LogLine { .. }) {
            return event;
        }
    }
}

/// Drain events until the terminal event for `id` arrives, returning it
/// along with every status event seen on the way
pub(crate) async fn events_until_terminal(
    events: &mut Receiver<Event>,
    id: JobId,
) -> (Vec<Event>, TerminalStatus, String, Option<PathBuf>) {
    let mut seen = Vec::new();
    loop {
        let event = next_status_event(events).await;
        if let Event::JobTerminal {
            id: tid,
            status,
            message,
            file_path,
            ..
        } = &event
        {
            if *tid == id {
                let (status, message, file_path) =
                    (*status, message.clone(), file_path.clone());
                seen.push(event);
                return (seen, status, message, file_path);
            }
        }
        seen.push(event);
    }
}
