use clap::Parser;
use std::path::PathBuf;

/// Start-up settings, taken from the command line or the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "stream_muxer", version, about = "Download and merge separate video/audio streams with yt-dlp and ffmpeg")]
pub struct Settings {
    /// yt-dlp executable
    #[arg(long = "yt-dlp", env = "STREAM_MUXER_YTDLP", default_value = "yt-dlp")]
    pub ytdlp: String,

    /// ffmpeg executable
    #[arg(long, env = "STREAM_MUXER_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: String,

    /// Python interpreter used to pip-install yt-dlp when it is missing
    #[arg(long, env = "STREAM_MUXER_PYTHON", default_value = default_python())]
    pub python: String,

    /// Browser whose cookies yt-dlp should use
    #[arg(long, env = "STREAM_MUXER_COOKIES_BROWSER", default_value = "firefox")]
    pub cookies_browser: String,

    /// Do not pass browser cookies to yt-dlp
    #[arg(long)]
    pub no_cookies: bool,

    /// Destination folder pre-filled in the form
    #[arg(long, env = "STREAM_MUXER_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Skip probing and installing yt-dlp / ffmpeg at start-up
    #[arg(long)]
    pub skip_dependency_check: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "STREAM_MUXER_LOG", default_value = "info")]
    pub log_level: String,
}

impl Settings {
    /// Browser handed to `--cookies-from-browser`, if cookies are enabled.
    pub fn cookies(&self) -> Option<String> {
        let browser = self.cookies_browser.trim();
        if self.no_cookies || browser.is_empty() {
            None
        } else {
            Some(browser.to_string())
        }
    }
}

fn default_python() -> &'static str {
    if cfg!(target_os = "windows") { "python" } else { "python3" }
}
