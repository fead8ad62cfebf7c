//! Per-job output interpretation.
//!
//! One [`OutputInterpreter`] exists per job. Both stream readers feed lines
//! into it, so all mutations happen behind the job's interpreter lock. It
//! extracts metadata JSON, progress fields, and the resolved output filename,
//! and retains a bounded diagnostic buffer for the error classifier.
//!
//! Filename resolution is a priority-ordered resolver, not
//! "whichever parses last wins":
//! 1. merge / audio-extraction markers name the final post-processed file and
//!    always overwrite;
//! 2. metadata JSON (`filepath` / `_filename`) sets the path when present;
//! 3. a `Destination:` marker may name an intermediate file and is only a
//!    fallback while no path is known, skipping `.part`/`.ytdl` temporaries.
//!
//! An empty candidate never overwrites a non-empty path.

use crate::types::Progress;
use regex::Regex;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

#[allow(clippy::unwrap_used)]
static PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\[download\]\s+([\d\.]+)%\s+of\s+.*?(?:at\s+([\d\.]+\s*(?:KiB/s|MiB/s|GiB/s|B/s))?)?\s*(?:ETA\s+(.*))?",
    )
    .unwrap()
});

#[allow(clippy::unwrap_used)]
static MERGING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"Merging formats into "(.+?)""#).unwrap());

#[allow(clippy::unwrap_used)]
static EXTRACTING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Extracting audio to (.+)").unwrap());

#[allow(clippy::unwrap_used)]
static DESTINATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Destination: (.+)").unwrap());

/// Sentinel for absent or malformed speed/ETA fields
pub const NOT_AVAILABLE: &str = "N/A";

/// Which pipe a line arrived on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    /// The process's standard output (metadata, progress, markers)
    Stdout,
    /// The process's standard error (diagnostics)
    Stderr,
}

impl StreamKind {
    /// Label used when forwarding lines to the log
    pub fn label(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

/// Structured meaning extracted from one output line
#[derive(Clone, Debug, PartialEq)]
pub enum Parsed {
    /// Confirmed metadata arrived (first JSON line only)
    Metadata {
        /// Confirmed title
        title: String,
    },
    /// A progress line
    Progress(Progress),
    /// Nothing structured; the line is still logged and buffered
    None,
}

/// Subset of the downloader's `--print-json` metadata we care about
#[derive(Debug, Deserialize)]
struct MetadataLine {
    title: Option<String>,
    filepath: Option<String>,
    #[serde(rename = "_filename")]
    filename: Option<String>,
}

/// Stateful per-job output parser
#[derive(Debug)]
pub struct OutputInterpreter {
    download_dir: PathBuf,
    title: Option<String>,
    resolved_path: Option<PathBuf>,
    /// True once the path came from a merge/extract marker; a later
    /// metadata line may not downgrade it
    path_is_final: bool,
    metadata_seen: bool,
    diagnostics: VecDeque<String>,
    diagnostics_cap: usize,
}

impl OutputInterpreter {
    /// Create an interpreter for one job
    pub fn new(download_dir: impl Into<PathBuf>, diagnostics_cap: usize) -> Self {
        Self {
            download_dir: download_dir.into(),
            title: None,
            resolved_path: None,
            path_is_final: false,
            metadata_seen: false,
            diagnostics: VecDeque::with_capacity(diagnostics_cap.min(64)),
            diagnostics_cap: diagnostics_cap.max(1),
        }
    }

    /// Confirmed title, when metadata has arrived
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Resolved output path, when any marker or metadata has named one
    pub fn resolved_path(&self) -> Option<&Path> {
        self.resolved_path.as_deref()
    }

    /// Snapshot of the diagnostic buffer for the classifier
    pub fn diagnostics(&self) -> Vec<String> {
        self.diagnostics.iter().cloned().collect()
    }

    /// Interpret one stripped, non-empty line.
    ///
    /// Every line is buffered for diagnostics; only stdout lines are parsed
    /// for structure. The caller forwards the raw line to the log regardless
    /// of the return value.
    pub fn interpret(&mut self, line: &str, stream: StreamKind) -> Parsed {
        self.push_diagnostic(format!("[{}] {}", stream.label(), line));

        if stream != StreamKind::Stdout {
            return Parsed::None;
        }

        // A syntactically complete JSON line is tried as metadata first;
        // failure falls through silently to plain-text handling.
        if !self.metadata_seen && line.starts_with('{') && line.ends_with('}') {
            if let Ok(metadata) = serde_json::from_str::<MetadataLine>(line) {
                self.metadata_seen = true;
                if let Some(path) = metadata.filepath.or(metadata.filename) {
                    self.set_path(&path, false);
                }
                if let Some(title) = metadata.title.filter(|t| !t.is_empty()) {
                    self.title = Some(title.clone());
                    return Parsed::Metadata { title };
                }
                return Parsed::None;
            }
        }

        if let Some(captures) = MERGING_RE.captures(line) {
            self.set_path(captures[1].trim(), true);
            return Parsed::None;
        }
        if let Some(captures) = EXTRACTING_RE.captures(line) {
            self.set_path(captures[1].trim(), true);
            return Parsed::None;
        }
        if self.resolved_path.is_none() {
            if let Some(captures) = DESTINATION_RE.captures(line) {
                let candidate = captures[1].trim();
                let lower = candidate.to_lowercase();
                if !lower.ends_with(".part") && !lower.ends_with(".ytdl") {
                    self.set_path(candidate, false);
                }
                return Parsed::None;
            }
        }

        if let Some(captures) = PROGRESS_RE.captures(line) {
            let percent = match captures[1].parse::<f32>() {
                Ok(value) => value.clamp(0.0, 100.0),
                Err(_) => return Parsed::None,
            };
            let speed = captures
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());
            let eta = captures
                .get(3)
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());
            return Parsed::Progress(Progress {
                percent,
                speed,
                eta,
            });
        }

        Parsed::None
    }

    /// Record a path candidate. Empty candidates never overwrite; merge and
    /// extract markers (`is_final`) take priority over everything else.
    fn set_path(&mut self, candidate: &str, is_final: bool) {
        if candidate.is_empty() {
            return;
        }
        if self.path_is_final && !is_final {
            return;
        }
        let mut path = PathBuf::from(candidate);
        if path.is_relative() {
            path = self.download_dir.join(path);
        }
        self.resolved_path = Some(path);
        if is_final {
            self.path_is_final = true;
        }
    }

    fn push_diagnostic(&mut self, line: String) {
        if self.diagnostics.len() >= self.diagnostics_cap {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(line);
    }
}
