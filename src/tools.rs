//! Invocation of the external programs (yt-dlp, ffmpeg, package managers).
//!
//! Everything that launches a process goes through [`ToolRunner`], so the rest
//! of the crate can be exercised against a scripted runner in tests.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    process::Command,
    sync::mpsc::UnboundedSender,
};

use crate::config::Settings;
use crate::error::AppError;

/// Captured result of a finished process.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turns a non-zero exit into [`AppError::ToolFailed`].
    pub fn check(self, tool: &str) -> Result<ToolOutput, AppError> {
        if self.success() {
            Ok(self)
        } else {
            Err(AppError::ToolFailed {
                tool: tool.to_string(),
                code: self.code,
                stderr: self.stderr,
            })
        }
    }
}

#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Runs `program` to completion and captures stdout/stderr.
    async fn output(&self, program: &str, args: &[String]) -> Result<ToolOutput, AppError>;

    /// Runs `program`, forwarding every stdout line to `lines` as it arrives.
    /// The returned output has an empty `stdout`.
    async fn stream(
        &self,
        program: &str,
        args: &[String],
        lines: &UnboundedSender<String>,
    ) -> Result<ToolOutput, AppError>;
}

/// Runs real processes with `tokio::process`.
///
/// Children are killed when the future driving them is dropped, which is how
/// job cancellation stops a running download.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl ToolRunner for SystemRunner {
    async fn output(&self, program: &str, args: &[String]) -> Result<ToolOutput, AppError> {
        tracing::debug!(program, ?args, "running");
        let out = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| AppError::Spawn { tool: program.to_string(), source })?;
        Ok(ToolOutput {
            code: out.status.code(),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        })
    }

    async fn stream(
        &self,
        program: &str,
        args: &[String],
        lines: &UnboundedSender<String>,
    ) -> Result<ToolOutput, AppError> {
        tracing::debug!(program, ?args, "running (streamed)");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| AppError::Spawn { tool: program.to_string(), source })?;

        let out = child.stdout.take().ok_or_else(|| AppError::EmptyOutput(program.to_string()))?;
        let mut err = child.stderr.take().ok_or_else(|| AppError::EmptyOutput(program.to_string()))?;

        // stderr is drained concurrently so a chatty tool never blocks on a full pipe
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Err(e) = err.read_to_end(&mut buf).await {
                tracing::debug!(error = %e, "stderr read interrupted");
            }
            String::from_utf8_lossy(&buf).into_owned()
        });

        // lines may be in the console code page, not UTF-8
        let mut reader = BufReader::new(out).split(b'\n');
        while let Some(raw) = reader.next_segment().await? {
            let line = String::from_utf8_lossy(&raw);
            let _ = lines.send(line.trim_end_matches('\r').to_string());
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();
        Ok(ToolOutput { code: status.code(), stdout: String::new(), stderr })
    }
}

/// Command lines for yt-dlp and ffmpeg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub ytdlp: String,
    pub ffmpeg: String,
    pub cookies_browser: Option<String>,
}

impl Tools {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            ytdlp: settings.ytdlp.clone(),
            ffmpeg: settings.ffmpeg.clone(),
            cookies_browser: settings.cookies(),
        }
    }

    fn ytdlp_base(&self) -> Vec<String> {
        match &self.cookies_browser {
            Some(browser) => vec!["--cookies-from-browser".to_owned(), browser.clone()],
            None => Vec::new(),
        }
    }

    pub fn list_formats_args(&self, url: &str) -> Vec<String> {
        let mut args = self.ytdlp_base();
        args.push("-F".to_owned());
        args.push(url.to_owned());
        args
    }

    pub fn thumbnail_args(&self, url: &str) -> Vec<String> {
        let mut args = self.ytdlp_base();
        args.push("--get-thumbnail".to_owned());
        args.push(url.to_owned());
        args
    }

    pub fn title_args(&self, url: &str) -> Vec<String> {
        let mut args = self.ytdlp_base();
        args.push("--get-title".to_owned());
        args.push(url.to_owned());
        args
    }

    pub fn download_args(&self, url: &str, format_id: &str, output: &Path, fragments: u32) -> Vec<String> {
        let mut args = self.ytdlp_base();
        args.push(url.to_owned());
        args.push("-f".to_owned());
        args.push(format_id.to_owned());
        args.push("-o".to_owned());
        args.push(output.display().to_string());
        args.push("--concurrent-fragments".to_owned());
        args.push(fragments.to_string());
        args.push("--newline".to_owned());
        args
    }

    pub fn mux_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        vec![
            "-i".to_owned(),
            video.display().to_string(),
            "-i".to_owned(),
            audio.display().to_string(),
            "-c:v".to_owned(),
            "copy".to_owned(),
            "-c:a".to_owned(),
            "copy".to_owned(),
            output.display().to_string(),
        ]
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tools() -> Tools {
        Tools { ytdlp: "yt-dlp".into(), ffmpeg: "ffmpeg".into(), cookies_browser: Some("firefox".into()) }
    }

    #[test]
    fn list_formats_passes_cookies_first() {
        assert_eq!(
            tools().list_formats_args("https://example.com/v"),
            ["--cookies-from-browser", "firefox", "-F", "https://example.com/v"]
        );
    }

    #[test]
    fn cookies_are_omitted_when_disabled() {
        let t = Tools { cookies_browser: None, ..tools() };
        assert_eq!(t.title_args("u"), ["--get-title", "u"]);
    }

    #[test]
    fn download_args_carry_format_output_and_fragments() {
        let args = tools().download_args("u", "137", &PathBuf::from("/out/video_temp_x.137"), 4);
        let joined = args.join(" ");
        assert!(joined.contains("-f 137"));
        assert!(joined.contains("-o /out/video_temp_x.137"));
        assert!(joined.contains("--concurrent-fragments 4"));
    }

    #[test]
    fn mux_copies_both_codecs() {
        let args = Tools::mux_args(Path::new("v"), Path::new("a"), Path::new("o.mkv"));
        assert_eq!(args, ["-i", "v", "-i", "a", "-c:v", "copy", "-c:a", "copy", "o.mkv"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stream_survives_invalid_utf8() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let script = r"printf '[download] Destination: C:\\\357\n[download]  50.0%% of 1.00MiB\n'; \
            printf 'WARNING: \377\nERROR: real cause\n' >&2; exit 1";
        let args = vec!["-c".to_string(), script.to_string()];
        let out = SystemRunner.stream("sh", &args, &tx).await.unwrap();
        drop(tx);

        let mut got = Vec::new();
        while let Some(line) = rx.recv().await {
            got.push(line);
        }
        assert_eq!(got.len(), 2);
        assert!(got[0].starts_with("[download] Destination: C:"));
        assert_eq!(got[1], "[download]  50.0% of 1.00MiB");
        assert_eq!(out.code, Some(1));
        assert!(out.stderr.contains("ERROR: real cause"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn output_decodes_lossily() {
        let args = vec!["-c".to_string(), r"printf 'a\377b'".to_string()];
        let out = SystemRunner.output("sh", &args).await.unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "a\u{FFFD}b");
    }

    #[test]
    fn check_maps_failure_to_error() {
        let err = ToolOutput { code: Some(2), stdout: String::new(), stderr: "boom\n".into() }
            .check("yt-dlp")
            .unwrap_err();
        assert_eq!(err.to_string(), "yt-dlp exited with code 2: boom");
    }
}
