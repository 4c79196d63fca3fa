//! Desktop front-end that downloads separate video and audio streams with
//! yt-dlp and merges them with ffmpeg.

// Start-up settings (CLI flags / environment)
mod config;
// Probing and installing yt-dlp / ffmpeg
mod deps;
mod error;
// `yt-dlp -F` parsing and dropdown entries
mod formats;
// Form, validation and job models
mod model;
// Download → title → merge → cleanup chain
mod pipeline;
// Progress parsing utilities
mod progress;
mod sanitize;
// Thumbnail lookup and decoding
mod thumbnail;
// Process runner and command lines
mod tools;

use std::{collections::HashMap, path::Path, sync::Arc};

use clap::Parser;
use eframe::{App, Frame, egui};
use egui::{ColorImage, TextureOptions, Visuals};
use rfd::FileDialog;
use tokio::{
    runtime::Runtime,
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
};
use tracing_subscriber::EnvFilter;

use config::Settings;
use formats::FormatListing;
use model::{Container, DEFAULT_THREADS, DownloadForm, FormatChoices, Job, JobStatus, THREAD_CHOICES};
use pipeline::{JobEvent, JobHandle, JobUpdate};
use tools::{SystemRunner, ToolRunner, Tools};

/// Program entry point: checks the tools, starts the runtime and launches the GUI
fn main() -> Result<(), eframe::Error> {
    let settings = Settings::parse();
    init_logging(&settings.log_level);

    let rt = match Runtime::new() {
        Ok(rt) => Arc::new(rt),
        Err(e) => {
            tracing::error!(error = %e, "could not start the async runtime");
            std::process::exit(1);
        }
    };
    let runner: Arc<dyn ToolRunner> = Arc::new(SystemRunner);

    if settings.skip_dependency_check {
        tracing::info!("dependency check skipped");
    } else if let Err(e) = rt.block_on(deps::check_and_install(runner.as_ref(), &deps::required(&settings))) {
        tracing::error!(error = %e, "error while checking dependencies");
        std::process::exit(1);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([800.0, 900.0])
            .with_title("Stream Muxer"),
        ..Default::default()
    };
    eframe::run_native(
        "Stream Muxer",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(MuxerApp::new(rt, runner, &settings))
        }),
    )
}

/// Colour-coded console output; RUST_LOG wins over `--log-level`.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// Results of a *Refresh* click, sent back from the runtime
enum UiEvent {
    Formats(FormatListing),
    FormatsFailed(String),
    Thumbnail(ColorImage),
}

/// Application state for the GUI
struct MuxerApp {
    rt: Arc<Runtime>,
    runner: Arc<dyn ToolRunner>,
    tools: Tools,
    /// Cookie browser, for the sign-in hint
    cookies_browser: Option<String>,

    url_input: String,
    output_dir: String,
    choices: FormatChoices,
    threads: String,
    container: Container,

    thumbnail: Option<egui::TextureHandle>,
    refreshing: bool,
    /// Non-modal status under the buttons
    status: Option<String>,
    /// Validation failure shown in a modal window
    message: Option<String>,

    ui_tx: UnboundedSender<UiEvent>,
    ui_rx: UnboundedReceiver<UiEvent>,
    job_tx: UnboundedSender<JobEvent>,
    job_rx: UnboundedReceiver<JobEvent>,
    jobs: Vec<Job>,
    handles: HashMap<String, JobHandle>,
}

impl MuxerApp {
    fn new(rt: Arc<Runtime>, runner: Arc<dyn ToolRunner>, settings: &Settings) -> Self {
        let (ui_tx, ui_rx) = unbounded_channel();
        let (job_tx, job_rx) = unbounded_channel();
        Self {
            rt,
            runner,
            tools: Tools::from_settings(settings),
            cookies_browser: settings.cookies(),
            url_input: String::new(),
            output_dir: settings
                .output_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            choices: FormatChoices::default(),
            threads: DEFAULT_THREADS.to_string(),
            container: Container::default(),
            thumbnail: None,
            refreshing: false,
            status: None,
            message: None,
            ui_tx,
            ui_rx,
            job_tx,
            job_rx,
            jobs: Vec::new(),
            handles: HashMap::new(),
        }
    }

    /// Lists formats, then looks up and decodes the thumbnail, off the UI thread.
    fn refresh(&mut self, ctx: &egui::Context) {
        let url = self.url_input.trim().to_string();
        if url.is_empty() {
            self.message = Some(error::ValidationError::EmptyUrl.to_string());
            return;
        }

        self.refreshing = true;
        self.thumbnail = None;
        self.status = Some("Fetching formats…".into());
        let runner = Arc::clone(&self.runner);
        let tools = self.tools.clone();
        let tx = self.ui_tx.clone();
        let browser = self.cookies_browser.clone();
        let width = ctx.screen_rect().width();
        let ctx = ctx.clone();

        self.rt.spawn(async move {
            match formats::list_formats(runner.as_ref(), &tools, &url).await {
                Ok(listing) if !listing.is_empty() => {
                    let _ = tx.send(UiEvent::Formats(listing));
                }
                Ok(_) => {
                    let _ = tx.send(UiEvent::FormatsFailed("yt-dlp returned no formats".into()));
                    ctx.request_repaint();
                    return;
                }
                Err(e) => {
                    tracing::error!(error = %e, "error while fetching formats");
                    if let Some(b) = browser {
                        tracing::warn!("make sure you are signed in to the site in {b}");
                    }
                    let _ = tx.send(UiEvent::FormatsFailed(e.to_string()));
                    ctx.request_repaint();
                    return;
                }
            }
            ctx.request_repaint();

            let thumb = match thumbnail::thumbnail_url(runner.as_ref(), &tools, &url).await {
                Ok(thumb) => thumb,
                Err(e) => {
                    tracing::error!(error = %e, "error while fetching the thumbnail URL");
                    return;
                }
            };
            match tokio::task::spawn_blocking(move || thumbnail::fetch_thumbnail(&thumb, width)).await {
                Ok(Ok(img)) => {
                    let _ = tx.send(UiEvent::Thumbnail(img));
                    ctx.request_repaint();
                }
                Ok(Err(e)) => tracing::error!(error = %e, "error while loading the thumbnail"),
                Err(e) => tracing::error!(error = %e, "thumbnail task panicked"),
            }
        });
    }

    fn start_download(&mut self) {
        let form = DownloadForm {
            url: self.url_input.clone(),
            output_dir: self.output_dir.clone(),
            video_choice: self.choices.selected_video.clone(),
            audio_choice: self.choices.selected_audio.clone(),
            threads: self.threads.clone(),
            container: self.container,
        };
        let launched = pipeline::launch(
            self.rt.handle(),
            Arc::clone(&self.runner),
            self.tools.clone(),
            &form,
            self.job_tx.clone(),
        );
        match launched {
            Ok((handle, request)) => {
                tracing::info!(job = %handle.id, url = %request.url, "download started");
                self.jobs.push(Job {
                    id: handle.id.clone(),
                    title: request.url.clone(),
                    output_dir: request.output_dir.clone(),
                    status: JobStatus::Starting,
                    progress: 0.0,
                });
                self.handles.insert(handle.id.clone(), handle);
            }
            Err(e) => self.message = Some(e.to_string()),
        }
    }

    fn poll_events(&mut self, ctx: &egui::Context) {
        while let Ok(ev) = self.ui_rx.try_recv() {
            match ev {
                UiEvent::Formats(listing) => {
                    self.choices.apply(&listing);
                    self.status = None;
                    self.refreshing = false;
                }
                UiEvent::FormatsFailed(err) => {
                    self.status = Some(format!("Could not get the format list: {err}"));
                    self.refreshing = false;
                }
                UiEvent::Thumbnail(img) => {
                    self.thumbnail = Some(ctx.load_texture("thumbnail", img, TextureOptions::default()));
                }
            }
        }

        while let Ok(ev) = self.job_rx.try_recv() {
            let Some(job) = self.jobs.iter_mut().find(|j| j.id == ev.job) else {
                continue;
            };
            match ev.update {
                JobUpdate::Status(status) => {
                    if status.is_finished() {
                        self.handles.remove(&job.id);
                        if matches!(status, JobStatus::Done(_)) {
                            job.progress = 1.0;
                        }
                    }
                    job.status = status;
                }
                JobUpdate::Progress(p) => job.progress = p,
                JobUpdate::Title(title) => job.title = title,
            }
        }
    }

    fn jobs_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Jobs");
        ui.separator();

        egui::ScrollArea::vertical().auto_shrink([false; 2]).show(ui, |ui| {
            let mut to_remove = vec![];

            for job in &self.jobs {
                ui.group(|ui| {
                    ui.label(&job.title);
                    ui.label(job.status.label());
                    if !job.status.is_finished() {
                        ui.add(egui::ProgressBar::new(job.progress).show_percentage());
                        if ui.button("Cancel").clicked() {
                            if let Some(handle) = self.handles.get(&job.id) {
                                handle.cancel();
                            }
                        }
                    } else {
                        ui.horizontal(|ui| {
                            if ui.button("Open Folder").clicked() {
                                open_folder(&job.output_dir);
                            }
                            if ui.add(egui::Button::new("❌").fill(egui::Color32::RED)).clicked() {
                                to_remove.push(job.id.clone());
                            }
                        });
                    }
                });
            }

            if !to_remove.is_empty() {
                self.jobs.retain(|j| !to_remove.contains(&j.id));
            }
        });
    }

    fn form(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.heading("Stream Muxer");

        ui.label("URL:");
        ui.add(egui::TextEdit::singleline(&mut self.url_input).desired_width(f32::INFINITY));

        ui.label("Destination folder:");
        ui.horizontal(|ui| {
            ui.text_edit_singleline(&mut self.output_dir);
            if ui.button("Browse…").clicked() {
                let mut dialog = FileDialog::new();
                if !self.output_dir.is_empty() {
                    dialog = dialog.set_directory(&self.output_dir);
                }
                if let Some(folder) = dialog.pick_folder() {
                    self.output_dir = folder.display().to_string();
                }
            }
        });

        let width = ui.available_width();
        ui.label("Video format:");
        egui::ComboBox::from_id_source("video_format")
            .width(width)
            .selected_text(placeholder(&self.choices.selected_video))
            .show_ui(ui, |ui| {
                for v in &self.choices.video {
                    ui.selectable_value(&mut self.choices.selected_video, v.clone(), v);
                }
            });

        ui.label("Audio format:");
        egui::ComboBox::from_id_source("audio_format")
            .width(width)
            .selected_text(placeholder(&self.choices.selected_audio))
            .show_ui(ui, |ui| {
                for a in &self.choices.audio {
                    ui.selectable_value(&mut self.choices.selected_audio, a.clone(), a);
                }
            });

        ui.label("Threads:");
        egui::ComboBox::from_id_source("threads")
            .width(width)
            .selected_text(&self.threads)
            .show_ui(ui, |ui| {
                for n in THREAD_CHOICES {
                    ui.selectable_value(&mut self.threads, n.to_string(), n.to_string());
                }
            });

        ui.label("Output format:");
        egui::ComboBox::from_id_source("container")
            .width(width)
            .selected_text(self.container.extension())
            .show_ui(ui, |ui| {
                for c in Container::ALL {
                    ui.selectable_value(&mut self.container, c, c.extension());
                }
            });

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            ui.add_enabled_ui(!self.refreshing, |ui| {
                if ui.button("Refresh formats & thumbnail").clicked() {
                    self.refresh(ctx);
                }
            });
            if ui.button("Best quality").clicked() {
                self.choices.select_best();
            }
            if ui.button("Download").clicked() {
                self.start_download();
            }
        });

        if let Some(status) = &self.status {
            let color = if self.refreshing { ui.visuals().text_color() } else { egui::Color32::LIGHT_RED };
            ui.colored_label(color, status);
        }

        ui.add_space(10.0);
        if let Some(tex) = &self.thumbnail {
            ui.vertical_centered(|ui| {
                ui.image(tex);
            });
        }
    }

    fn message_box(&mut self, ctx: &egui::Context) {
        let Some(msg) = self.message.clone() else {
            return;
        };
        egui::Window::new("Error")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(msg);
                if ui.button("OK").clicked() {
                    self.message = None;
                }
            });
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for MuxerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.poll_events(ctx);

        egui::SidePanel::right("jobs_panel").show(ctx, |ui| self.jobs_panel(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.add_enabled_ui(self.message.is_none(), |ui| self.form(ui, ctx));
            });
        });

        self.message_box(ctx);

        // Progress arrives over channels; keep repainting while jobs run
        if !self.handles.is_empty() || self.refreshing {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }
}

fn placeholder(selected: &str) -> &str {
    if selected.is_empty() { "Select…" } else { selected }
}

/// Opens `folder` in the platform file manager.
fn open_folder(folder: &Path) {
    let folder = folder.to_path_buf();
    std::thread::spawn(move || {
        #[cfg(target_os = "windows")]
        let opener = "explorer";
        #[cfg(target_os = "macos")]
        let opener = "open";
        #[cfg(all(unix, not(target_os = "macos")))]
        let opener = "xdg-open";

        if let Err(e) = std::process::Command::new(opener).arg(&folder).spawn() {
            tracing::warn!(folder = %folder.display(), error = %e, "could not open folder");
        }
    });
}
