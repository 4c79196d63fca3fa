use crate::error::AppError;
use crate::tools::{ToolRunner, Tools};

/// Separator between the fields of a dropdown entry.
pub const CHOICE_SEPARATOR: &str = " - ";

/// Output of `yt-dlp -F`, split into the streams we can merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatListing {
    pub all: Vec<String>,
    pub video: Vec<String>,
    pub audio: Vec<String>,
}

impl FormatListing {
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// Sorts raw listing lines into video-only and audio-only streams.
pub fn classify(stdout: &str) -> FormatListing {
    let mut listing = FormatListing::default();
    for line in stdout.lines() {
        if line.contains("video only") {
            listing.video.push(line.to_string());
        } else if line.contains("audio only") {
            listing.audio.push(line.to_string());
        }
        listing.all.push(line.to_string());
    }
    listing
}

/// Runs `yt-dlp -F` for `url` and classifies its output.
pub async fn list_formats<R: ToolRunner + ?Sized>(
    runner: &R,
    tools: &Tools,
    url: &str,
) -> Result<FormatListing, AppError> {
    let out = runner
        .output(&tools.ytdlp, &tools.list_formats_args(url))
        .await?
        .check(&tools.ytdlp)?;
    let listing = classify(&out.stdout);
    tracing::info!(
        url,
        video = listing.video.len(),
        audio = listing.audio.len(),
        "format list received"
    );
    Ok(listing)
}

/// Builds the dropdown text for a listing line: the id followed by the
/// resolution, extension/fps and channel columns and the trailing note.
///
/// Returns `None` for lines too short to carry those columns.
pub fn choice(line: &str) -> Option<String> {
    let cols: Vec<&str> = line.split_whitespace().collect();
    if cols.len() < 5 {
        return None;
    }
    let last = cols[cols.len() - 1];
    Some([cols[0], cols[2], cols[3], cols[4], last].join(CHOICE_SEPARATOR))
}

pub fn choices(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| {
            let c = choice(line);
            if c.is_none() {
                tracing::warn!(line = line.as_str(), "skipping malformed format line");
            }
            c
        })
        .collect()
}

/// Recovers the format id from a dropdown entry.
pub fn format_id(choice: &str) -> &str {
    choice.split(CHOICE_SEPARATOR).next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::mock::{MockRunner, failed};

    const LISTING: &str = "\
[info] Available formats for abc123:
ID  EXT   RESOLUTION FPS CH |   FILESIZE   TBR PROTO | VCODEC        VBR ACODEC      ABR ASR MORE INFO
------------------------------------------------------------------------------------------------------
sb0 mhtml 48x27        0    |                   mhtml | images                                storyboard
140 m4a   audio only      2 |    3.27MiB  129k https | audio only        mp4a.40.2  129k 44k medium, m4a_dash
137 mp4   1920x1080   30    |   40.56MiB 1603k https | avc1.640028 1603k video only              1080p, mp4_dash
18  mp4   640x360     30  2 |   10.01MiB  396k https | avc1.42001E       mp4a.40.2       44k 360p";

    fn tools() -> Tools {
        Tools { ytdlp: "yt-dlp".into(), ffmpeg: "ffmpeg".into(), cookies_browser: Some("firefox".into()) }
    }

    #[test]
    fn classify_splits_streams() {
        let listing = classify(LISTING);
        assert_eq!(listing.all.len(), 7);
        assert_eq!(listing.video.len(), 1);
        assert_eq!(listing.audio.len(), 1);
        assert!(listing.video[0].starts_with("137"));
        assert!(listing.audio[0].starts_with("140"));
    }

    #[test]
    fn muxed_and_header_lines_are_in_neither_list() {
        let listing = classify(LISTING);
        for line in listing.video.iter().chain(&listing.audio) {
            assert!(!line.starts_with("18 "));
            assert!(!line.starts_with("ID"));
            assert!(!line.starts_with("sb0"));
        }
    }

    #[test]
    fn video_line_never_lands_in_audio() {
        let listing = classify("1 mp4 1x1 30 | video only x");
        assert_eq!(listing.video.len(), 1);
        assert!(listing.audio.is_empty());
        let listing = classify("2 m4a audio only 2 | audio only y");
        assert!(listing.video.is_empty());
        assert_eq!(listing.audio.len(), 1);
    }

    #[test]
    fn choice_uses_fixed_columns() {
        let listing = classify(LISTING);
        assert_eq!(choice(&listing.video[0]).unwrap(), "137 - 1920x1080 - 30 - | - mp4_dash");
        assert_eq!(choice(&listing.audio[0]).unwrap(), "140 - audio - only - 2 - m4a_dash");
        assert_eq!(choice("137 mp4 1920x1080"), None);
    }

    #[test]
    fn format_id_is_first_field() {
        assert_eq!(format_id("137 - 1920x1080 - 30 - | - mp4_dash"), "137");
        assert_eq!(format_id(" 251 "), "251");
        assert_eq!(format_id(""), "");
    }

    #[tokio::test]
    async fn list_formats_runs_ytdlp_with_cookies() {
        let runner = MockRunner::new().on_flag("-F", LISTING);
        let listing = list_formats(&runner, &tools(), "https://example.com/v").await.unwrap();
        assert_eq!(listing.video.len(), 1);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "yt-dlp");
        assert_eq!(calls[0].1, ["--cookies-from-browser", "firefox", "-F", "https://example.com/v"]);
    }

    #[tokio::test]
    async fn list_formats_reports_tool_failure() {
        let runner = MockRunner::new().respond(|_, _| Some(failed("ERROR: Sign in to confirm")));
        let err = list_formats(&runner, &tools(), "u").await.unwrap_err();
        assert!(matches!(err, AppError::ToolFailed { ref stderr, .. } if stderr.contains("Sign in")));
    }
}
