use std::path::PathBuf;

use crate::error::ValidationError;
use crate::formats::{self, FormatListing};

/// Thread counts offered for `--concurrent-fragments`.
pub const THREAD_CHOICES: std::ops::RangeInclusive<u32> = 1..=10;
pub const DEFAULT_THREADS: u32 = 4;

/// Output container passed to ffmpeg through the file extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Container {
    #[default]
    Mp4,
    Mkv,
    Avi,
    Webm,
}

impl Container {
    pub const ALL: [Container; 4] = [Container::Mp4, Container::Mkv, Container::Avi, Container::Webm];

    pub fn extension(self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Mkv => "mkv",
            Container::Avi => "avi",
            Container::Webm => "webm",
        }
    }
}

/// Dropdown state for the two stream pickers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatChoices {
    pub video: Vec<String>,
    pub audio: Vec<String>,
    pub selected_video: String,
    pub selected_audio: String,
}

impl FormatChoices {
    /// Replaces the dropdown entries and clears the current selection.
    pub fn apply(&mut self, listing: &FormatListing) {
        self.video = formats::choices(&listing.video);
        self.audio = formats::choices(&listing.audio);
        self.selected_video.clear();
        self.selected_audio.clear();
    }

    /// Picks the first entry of each list, yt-dlp lists best streams first.
    pub fn select_best(&mut self) {
        if let Some(v) = self.video.first() {
            self.selected_video = v.clone();
        }
        if let Some(a) = self.audio.first() {
            self.selected_audio = a.clone();
        }
    }
}

/// Raw widget values at the moment *Download* is clicked.
#[derive(Debug, Clone, Default)]
pub struct DownloadForm {
    pub url: String,
    pub output_dir: String,
    pub video_choice: String,
    pub audio_choice: String,
    pub threads: String,
    pub container: Container,
}

/// Validated input of one download/merge job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub output_dir: PathBuf,
    pub video_format: String,
    pub audio_format: String,
    pub fragments: u32,
    pub container: Container,
}

impl DownloadForm {
    pub fn validate(&self) -> Result<DownloadRequest, ValidationError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(ValidationError::EmptyUrl);
        }
        let output_dir = self.output_dir.trim();
        if output_dir.is_empty() {
            return Err(ValidationError::EmptyDirectory);
        }
        let video_format = formats::format_id(&self.video_choice);
        let audio_format = formats::format_id(&self.audio_choice);
        if video_format.is_empty() || audio_format.is_empty() {
            return Err(ValidationError::MissingFormat);
        }
        let fragments = match self.threads.trim().parse::<i64>() {
            Ok(n) if n > 0 => u32::try_from(n).map_err(|_| ValidationError::InvalidThreads)?,
            _ => return Err(ValidationError::InvalidThreads),
        };
        Ok(DownloadRequest {
            url: url.to_string(),
            output_dir: PathBuf::from(output_dir),
            video_format: video_format.to_string(),
            audio_format: audio_format.to_string(),
            fragments,
            container: self.container,
        })
    }
}

/// Represents the current state of a job
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Starting,
    DownloadingVideo,
    DownloadingAudio,
    FetchingTitle,
    Merging,
    /// Finished; holds the merged file
    Done(PathBuf),
    Failed(String),
    Cancelled,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Done(_) | JobStatus::Failed(_) | JobStatus::Cancelled)
    }

    pub fn label(&self) -> String {
        match self {
            JobStatus::Starting => "Starting".into(),
            JobStatus::DownloadingVideo => "⬇️ Downloading video".into(),
            JobStatus::DownloadingAudio => "⬇️ Downloading audio".into(),
            JobStatus::FetchingTitle => "Fetching title".into(),
            JobStatus::Merging => "Merging".into(),
            JobStatus::Done(path) => format!("✅ Done: {}", path.display()),
            JobStatus::Failed(err) => format!("❌ {err}"),
            JobStatus::Cancelled => "Cancelled".into(),
        }
    }
}

/// A download/merge job shown in the side panel
pub struct Job {
    pub id: String,
    /// The URL until the title is known
    pub title: String,
    pub output_dir: PathBuf,
    pub status: JobStatus,
    /// Progress of the stream currently downloading (0.0 to 1.0)
    pub progress: f32,
}
