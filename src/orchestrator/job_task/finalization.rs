//! Finalization of completed jobs: artwork and subtitle discovery.
//!
//! Finalization runs only for jobs that completed with a verified output
//! file, and it never changes the terminal status: a job that downloaded
//! fine but has no usable artwork is still `Completed`.
//!
//! Artwork generation goes through the [`ArtworkGenerator`] trait so the
//! ffmpeg dependency stays pluggable. The CLI implementation shells out to
//! ffmpeg/ffprobe with a bounded timeout; the no-op implementation reports
//! every operation as unsupported.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::process::resolve_tool;
use crate::types::{DownloadRequest, MediaKind};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// File extensions treated as subtitle sidecars next to the output file
const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "vtt", "ass", "ssa", "sub", "lrc"];

/// Fallback frame timestamp when the media duration cannot be probed
const FALLBACK_FRAME_SECONDS: f64 = 1.0;

/// Artwork generation backend
///
/// Implementations must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait ArtworkGenerator: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Copy embedded album art out of an audio container into `output`
    async fn extract_album_art(&self, media: &Path, output: &Path) -> Result<()>;

    /// Render a single video frame at `at_seconds` into `output`
    async fn video_frame(&self, media: &Path, at_seconds: f64, output: &Path) -> Result<()>;

    /// Probe the media duration in seconds
    async fn probe_duration(&self, media: &Path) -> Result<f64>;
}

/// ffmpeg/ffprobe-backed artwork generation
pub struct CliArtworkGenerator {
    ffmpeg: PathBuf,
    ffprobe: Option<PathBuf>,
    timeout: Duration,
}

impl CliArtworkGenerator {
    /// Create a generator with explicit binary paths
    pub fn new(ffmpeg: PathBuf, ffprobe: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffmpeg,
            ffprobe,
            timeout,
        }
    }

    /// Resolve ffmpeg (and optionally ffprobe) from the configuration;
    /// `None` when ffmpeg is unavailable
    pub fn detect(config: &Config) -> Option<Self> {
        let ffmpeg = resolve_tool(
            config.tools.ffmpeg_path.as_deref(),
            "ffmpeg",
            config.tools.search_path,
        )
        .ok()?;
        let ffprobe = resolve_tool(
            config.tools.ffprobe_path.as_deref(),
            "ffprobe",
            config.tools.search_path,
        )
        .ok();
        Some(Self::new(ffmpeg, ffprobe, config.limits.tool_timeout))
    }

    /// Run a helper tool with a bound, failing on timeout or non-zero exit
    async fn run_tool(&self, binary: &Path, args: &[&str]) -> Result<Vec<u8>> {
        let mut cmd = Command::new(binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(crate::process::CREATE_NO_WINDOW);
        }
        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                Error::ExternalTool(format!(
                    "{} timed out after {:?}",
                    binary.display(),
                    self.timeout
                ))
            })?
            .map_err(|e| Error::ExternalTool(format!("{} failed: {e}", binary.display())))?;
        if !output.status.success() {
            return Err(Error::ExternalTool(format!(
                "{} exited with {}: {}",
                binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl ArtworkGenerator for CliArtworkGenerator {
    fn name(&self) -> &str {
        "ffmpeg-cli"
    }

    async fn extract_album_art(&self, media: &Path, output: &Path) -> Result<()> {
        let media_str = media.to_string_lossy();
        let output_str = output.to_string_lossy();
        self.run_tool(
            &self.ffmpeg,
            &[
                "-i",
                &media_str,
                "-map",
                "0:v",
                "-map",
                "-0:V?",
                "-c:v",
                "copy",
                "-f",
                "mjpeg",
                "-vframes",
                "1",
                "-y",
                &output_str,
            ],
        )
        .await?;
        verify_artwork(output).await
    }

    async fn video_frame(&self, media: &Path, at_seconds: f64, output: &Path) -> Result<()> {
        let at = format!("{at_seconds:.2}");
        let media_str = media.to_string_lossy();
        let output_str = output.to_string_lossy();
        self.run_tool(
            &self.ffmpeg,
            &[
                "-ss",
                &at,
                "-i",
                &media_str,
                "-vframes",
                "1",
                "-q:v",
                "2",
                "-y",
                &output_str,
            ],
        )
        .await?;
        verify_artwork(output).await
    }

    async fn probe_duration(&self, media: &Path) -> Result<f64> {
        let Some(ffprobe) = self.ffprobe.clone() else {
            return Err(Error::NotSupported(
                "duration probe requires ffprobe".to_string(),
            ));
        };
        let media_str = media.to_string_lossy();
        let stdout = self
            .run_tool(
                &ffprobe,
                &[
                    "-v",
                    "error",
                    "-show_entries",
                    "format=duration",
                    "-of",
                    "default=noprint_wrappers=1:nokey=1",
                    &media_str,
                ],
            )
            .await?;
        let text = String::from_utf8_lossy(&stdout);
        text.trim()
            .parse::<f64>()
            .map_err(|e| Error::ExternalTool(format!("unparseable ffprobe duration: {e}")))
    }
}

/// Backend used when ffmpeg is unavailable; every operation is unsupported
pub struct NoOpArtworkGenerator;

#[async_trait]
impl ArtworkGenerator for NoOpArtworkGenerator {
    fn name(&self) -> &str {
        "noop"
    }

    async fn extract_album_art(&self, _media: &Path, _output: &Path) -> Result<()> {
        Err(Error::NotSupported(
            "artwork generation disabled: ffmpeg not available".to_string(),
        ))
    }

    async fn video_frame(&self, _media: &Path, _at_seconds: f64, _output: &Path) -> Result<()> {
        Err(Error::NotSupported(
            "artwork generation disabled: ffmpeg not available".to_string(),
        ))
    }

    async fn probe_duration(&self, _media: &Path) -> Result<f64> {
        Err(Error::NotSupported(
            "duration probe disabled: ffprobe not available".to_string(),
        ))
    }
}

/// A generated file must exist and be non-empty to count as artwork
async fn verify_artwork(path: &Path) -> Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(Error::ExternalTool(format!(
            "generated artwork is empty: {}",
            path.display()
        ))),
        Err(e) => Err(Error::ExternalTool(format!(
            "generated artwork missing: {e}"
        ))),
    }
}

/// Discover or generate a thumbnail and detect subtitles for a completed job.
///
/// Priority order for the thumbnail: a sidecar `.jpg` written by the
/// downloader, then embedded album art for audio, then a midpoint video
/// frame. Failures are logged and degrade to no thumbnail.
pub(crate) async fn finalize_job(
    artwork: &dyn ArtworkGenerator,
    request: &DownloadRequest,
    media: &Path,
) -> (Option<PathBuf>, bool) {
    let thumbnail = find_or_generate_thumbnail(artwork, request.kind, media).await;
    let subtitles = detect_subtitles(request, media).await;
    (thumbnail, subtitles)
}

async fn find_or_generate_thumbnail(
    artwork: &dyn ArtworkGenerator,
    kind: MediaKind,
    media: &Path,
) -> Option<PathBuf> {
    let sidecar = media.with_extension("jpg");
    if tokio::fs::try_exists(&sidecar).await.unwrap_or(false) {
        debug!(path = %sidecar.display(), "using downloader-written thumbnail");
        return Some(sidecar);
    }

    let stem = media.file_stem()?.to_string_lossy();
    let parent = media.parent()?;
    match kind {
        MediaKind::Audio => {
            let target = parent.join(format!("{stem}_art.jpg"));
            match artwork.extract_album_art(media, &target).await {
                Ok(()) => Some(target),
                Err(e) => {
                    debug!(error = %e, "no album art extracted");
                    None
                }
            }
        }
        MediaKind::Video => {
            let at = match artwork.probe_duration(media).await {
                Ok(duration) => (duration / 2.0).max(0.0),
                Err(e) => {
                    debug!(error = %e, "duration probe failed, using fallback timestamp");
                    FALLBACK_FRAME_SECONDS
                }
            };
            let target = parent.join(format!("{stem}_thumbnail.jpg"));
            match artwork.video_frame(media, at, &target).await {
                Ok(()) => Some(target),
                Err(e) => {
                    debug!(error = %e, "video frame generation failed");
                    None
                }
            }
        }
    }
}

/// Whether the job produced subtitles: embedded per the request, or a
/// subtitle sidecar file sitting next to the output
async fn detect_subtitles(request: &DownloadRequest, media: &Path) -> bool {
    if !request.subtitles.enabled {
        return false;
    }
    if request.subtitles.embed {
        return true;
    }
    let (Some(stem), Some(parent)) = (media.file_stem(), media.parent()) else {
        return false;
    };
    let prefix = format!("{}.", stem.to_string_lossy());
    let mut entries = match tokio::fs::read_dir(parent).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "could not scan for subtitle files");
            return false;
        }
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(&prefix) {
            continue;
        }
        let is_subtitle = Path::new(name.as_ref())
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| SUBTITLE_EXTENSIONS.contains(&ext.as_str()));
        if is_subtitle {
            return true;
        }
    }
    false
}
