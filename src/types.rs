//! Core types for media-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use tokio_util::sync::CancellationToken;

/// Unique identifier for a job (one in-flight downloader invocation)
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    /// Create a new JobId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<JobId> for u64 {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of media being requested
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Video download (merged video+audio container)
    Video,
    /// Audio-only download (extracted audio track)
    Audio,
}

/// Source platform detected from the request URL
///
/// Drives the output-naming template: some platforms reuse identical titles
/// across uploads, so the uploader name is needed to disambiguate filenames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcePlatform {
    /// youtube.com / youtu.be
    YouTube,
    /// instagram.com
    Instagram,
    /// tiktok.com
    TikTok,
    /// Anything else yt-dlp supports
    Other,
}

#[allow(clippy::unwrap_used)]
static YOUTUBE_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?i)youtube\.com|youtu\.be").unwrap());
#[allow(clippy::unwrap_used)]
static INSTAGRAM_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?i)instagram\.com").unwrap());
#[allow(clippy::unwrap_used)]
static TIKTOK_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?i)tiktok\.com").unwrap());

impl SourcePlatform {
    /// Detect the platform from a URL
    pub fn detect(url: &str) -> Self {
        if YOUTUBE_RE.is_match(url) {
            Self::YouTube
        } else if INSTAGRAM_RE.is_match(url) {
            Self::Instagram
        } else if TIKTOK_RE.is_match(url) {
            Self::TikTok
        } else {
            Self::Other
        }
    }

    /// Whether filenames on this platform need the uploader to disambiguate
    /// otherwise-identical titles
    pub fn needs_uploader_in_filename(&self) -> bool {
        matches!(self, Self::Instagram | Self::TikTok)
    }
}

/// Format selection for a request
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatSelection {
    /// Platform-tuned default format expression
    #[default]
    Default,
    /// Explicit yt-dlp format id, passed through verbatim
    Explicit(String),
}

/// Subtitle download preferences
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleOptions {
    /// Whether subtitles should be downloaded at all
    #[serde(default)]
    pub enabled: bool,

    /// Language spec passed to the downloader; `"all"` is a recognized
    /// sentinel requesting every available language
    #[serde(default = "default_subtitle_languages")]
    pub languages: String,

    /// Whether subtitles should be embedded into the media container
    #[serde(default = "default_true")]
    pub embed: bool,
}

fn default_subtitle_languages() -> String {
    "en".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SubtitleOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            languages: default_subtitle_languages(),
            embed: true,
        }
    }
}

impl SubtitleOptions {
    /// Whether the language spec is the `"all"` sentinel
    pub fn wants_all_languages(&self) -> bool {
        self.languages.eq_ignore_ascii_case("all")
    }
}

/// A request to download one URL
///
/// Immutable once submitted, except the display title which is overwritten
/// when the downloader confirms the real title. The cancellation token may be
/// shared across an entire playlist expansion, giving bulk cancellation from
/// one signal.
#[derive(Clone, Debug)]
pub struct DownloadRequest {
    /// Source URL
    pub url: String,

    /// Kind of media to download
    pub kind: MediaKind,

    /// Format selection (explicit id or platform-tuned default)
    pub format: FormatSelection,

    /// Subtitle preferences
    pub subtitles: SubtitleOptions,

    /// Whether this request came from a playlist expansion
    pub playlist_member: bool,

    /// Display title; defaults to the URL until confirmed metadata arrives
    pub title: String,

    /// Cooperative cancellation signal, shared for batch cancellation
    pub cancel: CancellationToken,
}

impl DownloadRequest {
    /// Create a request with default format and subtitle options
    pub fn new(url: impl Into<String>, kind: MediaKind) -> Self {
        let url = url.into();
        Self {
            title: url.clone(),
            url,
            kind,
            format: FormatSelection::Default,
            subtitles: SubtitleOptions::default(),
            playlist_member: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Source platform detected from this request's URL
    pub fn platform(&self) -> SourcePlatform {
        SourcePlatform::detect(&self.url)
    }
}

/// Final status of a job; exactly one is reported per started job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalStatus {
    /// Exit code 0 and the output file verified on disk
    Completed,
    /// Launch failure, non-zero exit, or success without an output file
    Failed,
    /// Cancellation observed; reported only after the process has exited
    Cancelled,
}

/// Progress snapshot parsed from a downloader progress line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Percent complete, clamped to [0, 100]
    pub percent: f32,
    /// Human-readable speed, `"N/A"` when absent or malformed
    pub speed: String,
    /// Human-readable ETA, `"N/A"` when absent or malformed
    pub eta: String,
}

/// Event emitted during the download lifecycle
///
/// The sole artifact crossing the core/presentation boundary. For one job id,
/// all progress events precede its terminal event; cross-job ordering is
/// unspecified. Consumers must treat unrecognized tags as ignorable.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A request was accepted and assigned a job id
    JobAdded {
        /// Job ID
        id: JobId,
        /// Source URL
        url: String,
        /// Best-known display title (the URL until metadata arrives)
        title: String,
        /// Media kind
        kind: MediaKind,
        /// Detected source platform
        platform: SourcePlatform,
        /// Whether the request came from a playlist expansion
        playlist_member: bool,
    },

    /// Confirmed metadata arrived from the downloader's JSON output
    JobMetadata {
        /// Job ID
        id: JobId,
        /// Confirmed title
        title: String,
    },

    /// Progress update for a running job
    JobProgress {
        /// Job ID
        id: JobId,
        /// Percent complete, always within [0, 100]
        percent: f32,
        /// Download speed, `"N/A"` when unknown
        speed: String,
        /// Estimated time remaining, `"N/A"` when unknown
        eta: String,
    },

    /// Final status for a job; exactly one per started job
    JobTerminal {
        /// Job ID
        id: JobId,
        /// Terminal status
        status: TerminalStatus,
        /// Human-readable outcome message
        message: String,
        /// Resolved output file, when known
        #[serde(skip_serializing_if = "Option::is_none")]
        file_path: Option<PathBuf>,
        /// Thumbnail discovered or generated during finalization
        #[serde(skip_serializing_if = "Option::is_none")]
        thumbnail_path: Option<PathBuf>,
        /// Whether subtitles were downloaded or embedded
        subtitles: bool,
        /// When the terminal status was determined
        finished_at: DateTime<Utc>,
    },

    /// Playlist expansion progress ("fetched N items")
    BatchProgress {
        /// Number of playlist entries fetched so far
        fetched: usize,
    },

    /// Raw downloader output line, forwarded verbatim for log display
    LogLine {
        /// The line, prefixed with its stream label
        text: String,
    },
}

impl Event {
    /// Job id carried by this event, if any
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Event::JobAdded { id, .. }
            | Event::JobMetadata { id, .. }
            | Event::JobProgress { id, .. }
            | Event::JobTerminal { id, .. } => Some(*id),
            Event::BatchProgress { .. } | Event::LogLine { .. } => None,
        }
    }
}

/// Per-batch terminal counters maintained by the queue manager
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounters {
    /// Batch members that completed
    pub completed: usize,
    /// Batch members that failed
    pub failed: usize,
    /// Batch members cancelled after starting
    pub cancelled: usize,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    // --- SourcePlatform detection ---

    #[test]
    fn detect_youtube_long_and_short_urls() {
        assert_eq!(
            SourcePlatform::detect("https://www.youtube.com/watch?v=abc"),
            SourcePlatform::YouTube
        );
        assert_eq!(
            SourcePlatform::detect("https://youtu.be/abc"),
            SourcePlatform::YouTube
        );
    }

    #[test]
    fn detect_is_case_insensitive() {
        assert_eq!(
            SourcePlatform::detect("https://WWW.YOUTUBE.COM/watch?v=abc"),
            SourcePlatform::YouTube,
            "platform detection must ignore case"
        );
    }

    #[test]
    fn detect_instagram_and_tiktok_need_uploader() {
        let insta = SourcePlatform::detect("https://instagram.com/reel/xyz");
        let tiktok = SourcePlatform::detect("https://www.tiktok.com/@user/video/1");
        assert_eq!(insta, SourcePlatform::Instagram);
        assert_eq!(tiktok, SourcePlatform::TikTok);
        assert!(insta.needs_uploader_in_filename());
        assert!(tiktok.needs_uploader_in_filename());
        assert!(!SourcePlatform::YouTube.needs_uploader_in_filename());
    }

    #[test]
    fn detect_unknown_host_is_other() {
        assert_eq!(
            SourcePlatform::detect("https://example.com/video/1"),
            SourcePlatform::Other
        );
    }

    // --- SubtitleOptions ---

    #[test]
    fn all_sentinel_is_case_insensitive() {
        let mut opts = SubtitleOptions {
            enabled: true,
            languages: "ALL".to_string(),
            embed: false,
        };
        assert!(opts.wants_all_languages());
        opts.languages = "en,de".to_string();
        assert!(!opts.wants_all_languages());
    }

    // --- Event serialization ---

    #[test]
    fn event_serializes_with_snake_case_tag() {
        let event = Event::JobProgress {
            id: JobId(7),
            percent: 42.5,
            speed: "1.2MiB/s".to_string(),
            eta: "00:30".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "job_progress");
        assert_eq!(json["id"], 7);
    }

    #[test]
    fn terminal_event_omits_absent_paths() {
        let event = Event::JobTerminal {
            id: JobId(1),
            status: TerminalStatus::Failed,
            message: "boom".to_string(),
            file_path: None,
            thumbnail_path: None,
            subtitles: false,
            finished_at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(
            json.get("file_path").is_none(),
            "absent file_path must not appear in the payload"
        );
        assert_eq!(json["status"], "failed");
    }

    #[test]
    fn event_job_id_accessor_covers_all_variants() {
        assert_eq!(
            Event::LogLine {
                text: "x".to_string()
            }
            .job_id(),
            None
        );
        assert_eq!(Event::BatchProgress { fetched: 3 }.job_id(), None);
        assert_eq!(
            Event::JobMetadata {
                id: JobId(9),
                title: "t".to_string()
            }
            .job_id(),
            Some(JobId(9))
        );
    }

    // --- DownloadRequest ---

    #[test]
    fn new_request_defaults_title_to_url() {
        let req = DownloadRequest::new("https://youtu.be/abc", MediaKind::Video);
        assert_eq!(req.title, req.url);
        assert_eq!(req.format, FormatSelection::Default);
        assert!(!req.playlist_member);
        assert!(!req.cancel.is_cancelled());
    }

    #[test]
    fn job_id_display_and_conversions() {
        let id = JobId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(u64::from(id), 42);
        assert_eq!(JobId::from(42u64), id);
    }
}
