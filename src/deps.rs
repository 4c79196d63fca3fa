//! Start-up check for the external tools, installing whatever is missing.

use crate::config::Settings;
use crate::error::AppError;
use crate::tools::ToolRunner;

/// An external program plus the commands that probe and install it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: &'static str,
    pub program: String,
    pub probe_args: Vec<String>,
    pub installer: String,
    pub install_args: Vec<String>,
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

/// yt-dlp comes from pip, ffmpeg from the platform package manager.
pub fn required(settings: &Settings) -> Vec<Dependency> {
    let (installer, install_args) = if cfg!(target_os = "windows") {
        (
            "winget",
            strings(&["install", "--id", "Gyan.FFmpeg", "-e", "--accept-source-agreements", "--accept-package-agreements"]),
        )
    } else if cfg!(target_os = "macos") {
        ("brew", strings(&["install", "ffmpeg"]))
    } else {
        ("apt-get", strings(&["install", "-y", "ffmpeg"]))
    };

    vec![
        Dependency {
            name: "yt-dlp",
            program: settings.ytdlp.clone(),
            probe_args: strings(&["--version"]),
            installer: settings.python.clone(),
            install_args: strings(&["-m", "pip", "install", "yt-dlp"]),
        },
        Dependency {
            name: "ffmpeg",
            program: settings.ffmpeg.clone(),
            probe_args: strings(&["-version"]),
            installer: installer.to_string(),
            install_args,
        },
    ]
}

/// A dependency is present if its version probe starts and exits 0.
pub async fn is_installed<R: ToolRunner + ?Sized>(runner: &R, dep: &Dependency) -> bool {
    match runner.output(&dep.program, &dep.probe_args).await {
        Ok(out) => out.success(),
        Err(e) => {
            tracing::debug!(name = dep.name, error = %e, "probe failed");
            false
        }
    }
}

pub async fn install<R: ToolRunner + ?Sized>(runner: &R, dep: &Dependency) -> Result<(), AppError> {
    tracing::warn!(name = dep.name, installer = %dep.installer, "not found, installing");
    runner
        .output(&dep.installer, &dep.install_args)
        .await?
        .check(&dep.installer)?;
    Ok(())
}

/// Installs every missing dependency. The first failed install is returned
/// and the caller aborts start-up.
pub async fn check_and_install<R: ToolRunner + ?Sized>(runner: &R, deps: &[Dependency]) -> Result<(), AppError> {
    for dep in deps {
        if is_installed(runner, dep).await {
            tracing::debug!(name = dep.name, "found");
            continue;
        }
        install(runner, dep).await?;
        if !is_installed(runner, dep).await {
            tracing::warn!(name = dep.name, program = %dep.program, "installed but still not runnable, check PATH");
        }
    }
    tracing::info!("all dependencies installed");
    Ok(())
}
