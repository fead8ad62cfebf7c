//! Command construction for the external downloader.
//!
//! Pure translation from a [`DownloadRequest`] to the argument vector passed
//! to yt-dlp. No side effects: identical request and configuration always
//! yield an identical vector. Arguments are always passed as a vector, never
//! interpolated into a shell string.

use crate::config::Config;
use crate::types::{DownloadRequest, FormatSelection, MediaKind, SourcePlatform};

/// Default output template: title plus extension
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Template for platforms where identical titles are common and the uploader
/// name is needed to disambiguate
const OUTPUT_TEMPLATE_WITH_UPLOADER: &str = "%(uploader)s - %(title)s.%(ext)s";

/// Build the argument vector for one download request.
///
/// Layout mirrors the downloader's expectations: format options first, then
/// output directory and template, then behavioral flags, the URL last.
pub fn build_args(request: &DownloadRequest, config: &Config) -> Vec<String> {
    let platform = request.platform();
    let mut args: Vec<String> = Vec::with_capacity(24);

    args.extend(format_args(request, platform));

    args.push("-P".to_string());
    args.push(config.download_dir.to_string_lossy().into_owned());
    args.push("-o".to_string());
    args.push(output_template(platform).to_string());

    args.push("--no-warnings".to_string());
    args.push("--write-thumbnail".to_string());
    args.push("--convert-thumbnails".to_string());
    args.push("jpg".to_string());
    args.push("--print-json".to_string());

    if request.subtitles.enabled {
        args.push("--write-subs".to_string());
        if request.subtitles.wants_all_languages() {
            args.push("--all-subs".to_string());
        } else {
            args.push("--sub-lang".to_string());
            args.push(request.subtitles.languages.clone());
        }
        if request.subtitles.embed {
            args.push("--embed-subs".to_string());
        }
    }

    args.push(request.url.clone());
    args
}

fn output_template(platform: SourcePlatform) -> &'static str {
    if platform.needs_uploader_in_filename() {
        OUTPUT_TEMPLATE_WITH_UPLOADER
    } else {
        OUTPUT_TEMPLATE
    }
}

/// Format selection: an explicit format id passes through verbatim; the
/// defaults favor codec/container combinations that merge cleanly (avc+m4a
/// into mp4) so post-processing does not have to transcode.
fn format_args(request: &DownloadRequest, platform: SourcePlatform) -> Vec<String> {
    match &request.format {
        FormatSelection::Explicit(id) => {
            let mut args = vec!["-f".to_string(), id.clone()];
            if request.kind == MediaKind::Video {
                args.push("--merge-output-format".to_string());
                args.push("mp4".to_string());
            }
            args
        }
        FormatSelection::Default => match request.kind {
            MediaKind::Audio => vec![
                "-f".to_string(),
                "bestaudio[ext=m4a]/bestaudio".to_string(),
                "--extract-audio".to_string(),
                "--audio-format".to_string(),
                "m4a".to_string(),
            ],
            MediaKind::Video => {
                let selector = if platform == SourcePlatform::YouTube {
                    "bestvideo[ext=mp4][vcodec^=avc]+bestaudio[ext=m4a]/best[ext=mp4]/best"
                } else {
                    "bestvideo+bestaudio/best"
                };
                vec![
                    "-f".to_string(),
                    selector.to_string(),
                    "--merge-output-format".to_string(),
                    "mp4".to_string(),
                ]
            }
        },
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SubtitleOptions;
    use std::path::PathBuf;

    fn config() -> Config {
        Config {
            download_dir: PathBuf::from("/downloads"),
            ..Default::default()
        }
    }

    #[test]
    fn builder_is_pure_and_deterministic() {
        let req = DownloadRequest::new("https://youtu.be/abc", MediaKind::Video);
        let first = build_args(&req, &config());
        let second = build_args(&req, &config());
        assert_eq!(
            first, second,
            "identical request and config must yield an identical vector"
        );
    }

    #[test]
    fn url_is_always_the_last_argument() {
        let req = DownloadRequest::new("https://youtu.be/abc", MediaKind::Video);
        let args = build_args(&req, &config());
        assert_eq!(args.last().unwrap(), "https://youtu.be/abc");
    }

    #[test]
    fn explicit_format_passes_through_verbatim() {
        let mut req = DownloadRequest::new("https://youtu.be/abc", MediaKind::Video);
        req.format = FormatSelection::Explicit("137+140".to_string());
        let args = build_args(&req, &config());
        let f_pos = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(args[f_pos + 1], "137+140");
        assert!(
            args.contains(&"--merge-output-format".to_string()),
            "explicit video formats still request a clean merge container"
        );
    }

    #[test]
    fn explicit_audio_format_skips_merge_flag() {
        let mut req = DownloadRequest::new("https://youtu.be/abc", MediaKind::Audio);
        req.format = FormatSelection::Explicit("140".to_string());
        let args = build_args(&req, &config());
        assert!(!args.contains(&"--merge-output-format".to_string()));
    }

    #[test]
    fn default_audio_extracts_m4a() {
        let req = DownloadRequest::new("https://youtu.be/abc", MediaKind::Audio);
        let args = build_args(&req, &config());
        assert!(args.contains(&"--extract-audio".to_string()));
        assert!(args.contains(&"bestaudio[ext=m4a]/bestaudio".to_string()));
        assert!(args.contains(&"m4a".to_string()));
    }

    #[test]
    fn default_youtube_video_prefers_avc_mp4() {
        let req = DownloadRequest::new("https://www.youtube.com/watch?v=x", MediaKind::Video);
        let args = build_args(&req, &config());
        assert!(args.contains(
            &"bestvideo[ext=mp4][vcodec^=avc]+bestaudio[ext=m4a]/best[ext=mp4]/best".to_string()
        ));
    }

    #[test]
    fn default_non_youtube_video_uses_generic_selector() {
        let req = DownloadRequest::new("https://vimeo.com/123", MediaKind::Video);
        let args = build_args(&req, &config());
        assert!(args.contains(&"bestvideo+bestaudio/best".to_string()));
    }

    #[test]
    fn tiktok_template_includes_uploader() {
        let req = DownloadRequest::new("https://www.tiktok.com/@u/video/1", MediaKind::Video);
        let args = build_args(&req, &config());
        let o_pos = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[o_pos + 1], "%(uploader)s - %(title)s.%(ext)s");
    }

    #[test]
    fn youtube_template_is_title_only() {
        let req = DownloadRequest::new("https://youtu.be/abc", MediaKind::Video);
        let args = build_args(&req, &config());
        let o_pos = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[o_pos + 1], "%(title)s.%(ext)s");
    }

    #[test]
    fn download_dir_is_passed_as_a_flag() {
        let req = DownloadRequest::new("https://youtu.be/abc", MediaKind::Video);
        let args = build_args(&req, &config());
        let p_pos = args.iter().position(|a| a == "-P").unwrap();
        assert_eq!(args[p_pos + 1], "/downloads");
    }

    #[test]
    fn subtitles_disabled_adds_no_subtitle_flags() {
        let req = DownloadRequest::new("https://youtu.be/abc", MediaKind::Video);
        let args = build_args(&req, &config());
        assert!(!args.iter().any(|a| a.contains("subs")));
    }

    #[test]
    fn subtitle_all_sentinel_uses_all_subs() {
        let mut req = DownloadRequest::new("https://youtu.be/abc", MediaKind::Video);
        req.subtitles = SubtitleOptions {
            enabled: true,
            languages: "all".to_string(),
            embed: false,
        };
        let args = build_args(&req, &config());
        assert!(args.contains(&"--all-subs".to_string()));
        assert!(!args.contains(&"--sub-lang".to_string()));
        assert!(!args.contains(&"--embed-subs".to_string()));
    }

    #[test]
    fn subtitle_language_spec_and_embed() {
        let mut req = DownloadRequest::new("https://youtu.be/abc", MediaKind::Video);
        req.subtitles = SubtitleOptions {
            enabled: true,
            languages: "en,de".to_string(),
            embed: true,
        };
        let args = build_args(&req, &config());
        let lang_pos = args.iter().position(|a| a == "--sub-lang").unwrap();
        assert_eq!(args[lang_pos + 1], "en,de");
        assert!(args.contains(&"--embed-subs".to_string()));
        assert!(args.contains(&"--write-subs".to_string()));
    }
}
