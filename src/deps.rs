//! Startup dependency checking.
//!
//! Front-ends call [`check_dependencies`] once at startup to surface missing
//! or broken external tools before the first download is attempted. Missing
//! tools are reported, not fatal: the downloader binary is re-resolved at
//! launch time anyway, and ffmpeg/ffprobe only gate finalization extras.

use crate::config::Config;
use crate::process::resolve_tool;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Presence and version of one external tool
#[derive(Clone, Debug, Serialize)]
pub struct ToolStatus {
    /// Tool name as searched for (e.g. "yt-dlp")
    pub name: String,
    /// Resolved absolute path, when found
    pub path: Option<PathBuf>,
    /// First line of the tool's version output, when it could be probed
    pub version: Option<String>,
}

impl ToolStatus {
    /// Whether the tool was found on disk
    pub fn available(&self) -> bool {
        self.path.is_some()
    }
}

/// Availability report for all external tools the core can use
#[derive(Clone, Debug, Serialize)]
pub struct DependencyReport {
    /// The downloader itself; nothing works without it
    pub ytdlp: ToolStatus,
    /// Used for merge steps and finalization artwork
    pub ffmpeg: ToolStatus,
    /// Used for duration probes during video thumbnail generation
    pub ffprobe: ToolStatus,
}

impl DependencyReport {
    /// Whether downloads can run at all
    pub fn can_download(&self) -> bool {
        self.ytdlp.available()
    }

    /// Names of the tools that were not found
    pub fn missing(&self) -> Vec<&str> {
        [&self.ytdlp, &self.ffmpeg, &self.ffprobe]
            .into_iter()
            .filter(|t| !t.available())
            .map(|t| t.name.as_str())
            .collect()
    }
}

/// Probe all external tools and report what was found
pub async fn check_dependencies(config: &Config) -> DependencyReport {
    let timeout = config.limits.tool_timeout;
    let report = DependencyReport {
        ytdlp: probe_tool(
            config.tools.ytdlp_path.as_deref(),
            "yt-dlp",
            "--version",
            config.tools.search_path,
            timeout,
        )
        .await,
        ffmpeg: probe_tool(
            config.tools.ffmpeg_path.as_deref(),
            "ffmpeg",
            "-version",
            config.tools.search_path,
            timeout,
        )
        .await,
        ffprobe: probe_tool(
            config.tools.ffprobe_path.as_deref(),
            "ffprobe",
            "-version",
            config.tools.search_path,
            timeout,
        )
        .await,
    };
    info!(
        ytdlp = report.ytdlp.available(),
        ffmpeg = report.ffmpeg.available(),
        ffprobe = report.ffprobe.available(),
        "dependency check finished"
    );
    report
}

async fn probe_tool(
    configured: Option<&Path>,
    name: &str,
    version_flag: &str,
    search_path: bool,
    timeout: Duration,
) -> ToolStatus {
    let path = match resolve_tool(configured, name, search_path) {
        Ok(path) => path,
        Err(e) => {
            debug!(tool = name, error = %e, "tool not found");
            return ToolStatus {
                name: name.to_string(),
                path: None,
                version: None,
            };
        }
    };
    let version = probe_version(&path, version_flag, timeout).await;
    ToolStatus {
        name: name.to_string(),
        path: Some(path),
        version,
    }
}

/// Run `<tool> <flag>` with a bound and return the first output line
async fn probe_version(path: &Path, flag: &str, timeout: Duration) -> Option<String> {
    let mut cmd = Command::new(path);
    cmd.arg(flag)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(crate::process::CREATE_NO_WINDOW);
    }
    let output = tokio::time::timeout(timeout, cmd.output()).await.ok()?.ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}
