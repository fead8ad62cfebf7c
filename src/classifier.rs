//! Failure classification for downloader diagnostics.
//!
//! A fixed, ordered pattern table maps raw diagnostic text to a
//! human-readable failure category. The table is data, not code: new failure
//! modes are added as rows. The final row is a catch-all over any `ERROR:`
//! line, so classification of a non-zero exit always yields a non-empty,
//! actionable message even for unanticipated failures.

use regex::Regex;
use std::sync::LazyLock;

/// Maximum characters of the raw `ERROR:` payload echoed by the catch-all
const CATCH_ALL_PAYLOAD_LIMIT: usize = 150;

/// How many trailing raw lines to consider when no line looks
/// error/warning/failure-related
const FALLBACK_TAIL_LINES: usize = 10;

/// Ordered (pattern, message) rows; first match wins. The catch-all must stay
/// last.
static ERROR_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (
            r"(?i)ERROR:.*(?:video is unavailable|This video is not available|unavailable in your country)",
            "Video Unavailable: This video cannot be accessed (e.g., deleted, private, region-blocked).",
        ),
        (
            r"(?i)ERROR:.*(?:age-restricted)",
            "Age-Restricted Video: Please ensure you are logged in if required, or access via a browser.",
        ),
        (
            r"(?i)ERROR:.*(?:private video|requires login)",
            "Login/Private Video: This video is private or requires login credentials (e.g., channel membership).",
        ),
        (
            r"(?i)ERROR:.*(?:The uploader has not made this video available in your country|geo-restricted)",
            "Geo-Restricted: Video is not available in your region.",
        ),
        (
            r"(?i)ERROR:.*(?:no video formats found|no audio formats found)",
            "No Formats Found: the downloader could not find any suitable video or audio formats.",
        ),
        (
            r"(?i)ERROR:.*(?:Too Many Requests|429)",
            "Rate Limit Exceeded: You are making too many requests. Try again later, or use a VPN.",
        ),
        (
            r"(?i)ERROR:.*(?:The playlist is empty)",
            "Empty Playlist: The specified playlist contains no videos.",
        ),
        (
            r"(?i)ERROR:.*(?:VPN detected|Sorry for the interruption|Try again later)",
            "VPN/Bot Detection: The platform may be detecting VPN or automated access. Try a different connection or method.",
        ),
        (
            r"(?i)ERROR:.*(?:Could not download WebPage|HTTP Error 404|403|400)",
            "Network/URL Error: Failed to retrieve video information from the URL (e.g., page not found, access denied).",
        ),
        (
            r"(?i)ERROR:.*(?:Unsupported URL)",
            "Unsupported URL: The provided URL is not supported by the downloader or the specific extractor.",
        ),
        (
            r"(?i)ERROR:.*(?:Unknown host)",
            "Network Error: Could not resolve the host name. Check your internet connection.",
        ),
        (
            r"(?i)ERROR:(.*)",
            "Downloader error: check the log for details.",
        ),
    ]
    .into_iter()
    .map(|(pattern, message)| {
        let compiled = Regex::new(pattern);
        #[allow(clippy::expect_used)]
        let compiled = compiled.expect("classifier pattern table contains an invalid regex");
        (compiled, message)
    })
    .collect()
});

/// Classify diagnostic output into a human-readable failure message.
///
/// Only lines that look error/warning/failure-related are matched; when none
/// qualify, the last [`FALLBACK_TAIL_LINES`] raw lines are used instead.
/// Returns `None` only when no pattern matches at all (no `ERROR:` line in
/// the diagnostics).
pub fn classify(lines: &[String]) -> Option<String> {
    let mut haystack = lines
        .iter()
        .filter(|line| {
            let lower = line.to_lowercase();
            lower.contains("error") || lower.contains("warning") || lower.contains("fail")
        })
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");

    if haystack.is_empty() {
        let tail_start = lines.len().saturating_sub(FALLBACK_TAIL_LINES);
        haystack = lines[tail_start..].join("\n");
    }

    let last = ERROR_PATTERNS.len() - 1;
    for (idx, (pattern, message)) in ERROR_PATTERNS.iter().enumerate() {
        if idx < last {
            if pattern.is_match(&haystack) {
                return Some((*message).to_string());
            }
            continue;
        }

        // Catch-all: echo the raw ERROR: payload, truncated.
        let captures = pattern.captures(&haystack)?;
        let payload = captures
            .get(1)
            .map(|m| m.as_str().trim())
            .unwrap_or_default();
        if payload.is_empty() {
            return Some((*message).to_string());
        }
        return Some(format!(
            "Downloader error: {}",
            truncate_chars(payload, CATCH_ALL_PAYLOAD_LIMIT)
        ));
    }
    None
}

/// Truncate at a char boundary, appending an ellipsis when shortened
fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(limit).collect();
    truncated.push_str("...");
    truncated
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unavailable_video_matches_specific_row_not_catch_all() {
        let result = classify(&lines(&["ERROR: This video is not available"])).unwrap();
        assert!(
            result.starts_with("Video Unavailable"),
            "specific rows must win over the catch-all, got: {result}"
        );
    }

    #[test]
    fn age_restricted_is_classified() {
        let result = classify(&lines(&["ERROR: Sign in to confirm, age-restricted video"]));
        assert_eq!(
            result.unwrap(),
            "Age-Restricted Video: Please ensure you are logged in if required, or access via a browser."
        );
    }

    #[test]
    fn rate_limit_429_is_classified() {
        let result = classify(&lines(&["ERROR: HTTP Error 429: Too Many Requests"])).unwrap();
        assert!(result.starts_with("Rate Limit Exceeded"));
    }

    #[test]
    fn dns_failure_is_classified() {
        let result = classify(&lines(&["ERROR: Unable to download webpage: Unknown host"]));
        assert!(result.unwrap().starts_with("Network Error"));
    }

    #[test]
    fn unknown_error_falls_to_catch_all_with_payload() {
        let result = classify(&lines(&["ERROR: something completely new"])).unwrap();
        assert!(
            result.contains("something completely new"),
            "catch-all must echo the raw payload, got: {result}"
        );
        assert!(result.starts_with("Downloader error:"));
    }

    #[test]
    fn catch_all_truncates_long_payloads_with_ellipsis() {
        let long = format!("ERROR: {}", "x".repeat(400));
        let result = classify(&lines(&[long.as_str()])).unwrap();
        assert!(result.ends_with("..."), "long payloads must be truncated");
        assert!(
            result.len() < 200,
            "truncated message should be bounded, got {} chars",
            result.len()
        );
    }

    #[test]
    fn ordering_first_match_wins() {
        // Both the unavailable row and the catch-all match; the earlier row wins.
        let result = classify(&lines(&[
            "ERROR: generic noise",
            "ERROR: video is unavailable",
        ]))
        .unwrap();
        assert!(result.starts_with("Video Unavailable"));
    }

    #[test]
    fn non_error_lines_are_filtered_before_matching() {
        // The ERROR line qualifies; surrounding progress noise does not.
        let result = classify(&lines(&[
            "[download]  42.0% of 10MiB",
            "ERROR: Unsupported URL: https://example.com",
            "[download] 100% of 10MiB",
        ]))
        .unwrap();
        assert!(result.starts_with("Unsupported URL"));
    }

    #[test]
    fn tail_fallback_without_error_line_yields_none() {
        // No line qualifies as error/warning/fail, so only the raw tail is
        // scanned; with no ERROR: payload anywhere there is nothing to report.
        let items: Vec<String> = (0..30).map(|i| format!("line {i}")).collect();
        assert_eq!(classify(&items), None);
    }

    #[test]
    fn no_error_line_yields_none() {
        assert_eq!(classify(&lines(&["[download] Destination: a.mp4"])), None);
        assert_eq!(classify(&[]), None);
    }

    #[test]
    fn warning_only_output_without_error_line_yields_none() {
        // Warning lines are selected into the haystack but no ERROR: row matches.
        assert_eq!(
            classify(&lines(&["WARNING: unable to write thumbnail"])),
            None
        );
    }
}
