//! Download both streams, look up the title and merge them with ffmpeg.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::{
    runtime::Handle,
    sync::mpsc::{UnboundedSender, unbounded_channel},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{AppError, ValidationError};
use crate::model::{DownloadForm, DownloadRequest, JobStatus};
use crate::progress::parse_progress_from_line;
use crate::sanitize::sanitize_filename;
use crate::tools::{ToolRunner, Tools};

/// Update sent from a running job to the UI thread.
#[derive(Debug, Clone, PartialEq)]
pub struct JobEvent {
    pub job: String,
    pub update: JobUpdate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    Status(JobStatus),
    Progress(f32),
    Title(String),
}

/// Per-job temporary files for the two streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempPaths {
    pub video: PathBuf,
    pub audio: PathBuf,
}

impl TempPaths {
    pub fn new(dir: &Path, job: &str, request: &DownloadRequest) -> Self {
        Self {
            video: dir.join(format!("video_temp_{job}.{}", request.video_format)),
            audio: dir.join(format!("audio_temp_{job}.{}", request.audio_format)),
        }
    }
}

/// Handle to a spawned job; dropping it does not stop the job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub id: String,
    cancel: CancellationToken,
}

impl JobHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Validates `form` and, if it is complete, spawns the job on `rt`.
///
/// Nothing is launched when validation fails.
pub fn launch(
    rt: &Handle,
    runner: Arc<dyn ToolRunner>,
    tools: Tools,
    form: &DownloadForm,
    events: UnboundedSender<JobEvent>,
) -> Result<(JobHandle, DownloadRequest), ValidationError> {
    let request = form.validate()?;
    let id = Uuid::new_v4().simple().to_string();
    let cancel = CancellationToken::new();
    let handle = JobHandle { id: id.clone(), cancel: cancel.clone() };

    let req = request.clone();
    rt.spawn(async move {
        let merging = Mutex::new(None);
        let status = tokio::select! {
            result = run(runner.as_ref(), &tools, &req, &id, &events, &merging) => match result {
                Ok(path) => JobStatus::Done(path),
                Err(e) => {
                    tracing::error!(job = %id, error = %e, "download or merge failed");
                    JobStatus::Failed(e.to_string())
                }
            },
            _ = cancel.cancelled() => {
                tracing::warn!(job = %id, "download cancelled by user");
                let partial = merging.lock().map(|mut slot| slot.take()).unwrap_or_default();
                if let Some(output) = partial {
                    remove_partial(&output).await;
                }
                JobStatus::Cancelled
            }
        };
        let _ = events.send(JobEvent { job: id, update: JobUpdate::Status(status) });
    });

    Ok((handle, request))
}

/// Deletes a half-written merge so a retry is not refused by ffmpeg.
async fn remove_partial(output: &Path) {
    match tokio::fs::remove_file(output).await {
        Ok(()) => tracing::info!(output = %output.display(), "removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(output = %output.display(), error = %e, "could not remove partial output"),
    }
}

/// Runs the whole chain for one request and returns the merged file.
///
/// Temporary files are only removed after a successful merge. While ffmpeg
/// runs, `merging` holds the output path it is writing.
pub async fn run<R: ToolRunner + ?Sized>(
    runner: &R,
    tools: &Tools,
    request: &DownloadRequest,
    job: &str,
    events: &UnboundedSender<JobEvent>,
    merging: &Mutex<Option<PathBuf>>,
) -> Result<PathBuf, AppError> {
    let send = |update: JobUpdate| {
        let _ = events.send(JobEvent { job: job.to_string(), update });
    };
    let temps = TempPaths::new(&request.output_dir, job, request);

    tracing::info!(job, format = %request.video_format, "downloading video stream");
    send(JobUpdate::Status(JobStatus::DownloadingVideo));
    download_stream(runner, tools, request, &request.video_format, &temps.video, &send).await?;

    tracing::info!(job, format = %request.audio_format, "downloading audio stream");
    send(JobUpdate::Status(JobStatus::DownloadingAudio));
    send(JobUpdate::Progress(0.0));
    download_stream(runner, tools, request, &request.audio_format, &temps.audio, &send).await?;

    send(JobUpdate::Status(JobStatus::FetchingTitle));
    let title = fetch_title(runner, tools, &request.url).await?;
    send(JobUpdate::Title(title.clone()));

    let output = request
        .output_dir
        .join(format!("{}.{}", sanitize_filename(&title), request.container.extension()));

    tracing::info!(job, output = %output.display(), "merging video and audio");
    send(JobUpdate::Status(JobStatus::Merging));
    if let Ok(mut slot) = merging.lock() {
        *slot = Some(output.clone());
    }
    let merged = runner
        .output(&tools.ffmpeg, &Tools::mux_args(&temps.video, &temps.audio, &output))
        .await;
    if let Ok(mut slot) = merging.lock() {
        *slot = None;
    }
    merged?.check(&tools.ffmpeg)?;

    for temp in [&temps.video, &temps.audio] {
        if let Err(e) = tokio::fs::remove_file(temp).await {
            tracing::warn!(path = %temp.display(), error = %e, "could not remove temporary file");
        }
    }

    tracing::info!(job, output = %output.display(), "video downloaded and merged");
    Ok(output)
}

async fn download_stream<R, F>(
    runner: &R,
    tools: &Tools,
    request: &DownloadRequest,
    format_id: &str,
    target: &Path,
    send: &F,
) -> Result<(), AppError>
where
    R: ToolRunner + ?Sized,
    F: Fn(JobUpdate) + Sync,
{
    let args = tools.download_args(&request.url, format_id, target, request.fragments);
    let (tx, mut rx) = unbounded_channel();

    let download = async {
        let out = runner.stream(&tools.ytdlp, &args, &tx).await;
        drop(tx);
        out
    };
    let forward = async {
        while let Some(line) = rx.recv().await {
            tracing::debug!(target: "yt-dlp", "{line}");
            if let Some(pct) = parse_progress_from_line(&line) {
                send(JobUpdate::Progress(pct));
            }
        }
    };

    let (out, ()) = tokio::join!(download, forward);
    out?.check(&tools.ytdlp)?;
    Ok(())
}

/// Display title of the video, as yt-dlp reports it.
pub async fn fetch_title<R: ToolRunner + ?Sized>(
    runner: &R,
    tools: &Tools,
    url: &str,
) -> Result<String, AppError> {
    let out = runner
        .output(&tools.ytdlp, &tools.title_args(url))
        .await?
        .check(&tools.ytdlp)?;
    Ok(out.stdout.trim().to_string())
}
