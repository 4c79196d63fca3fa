use thiserror::Error;

/// Errors raised while driving the external tools or fetching the thumbnail.
#[derive(Debug, Error)]
pub enum AppError {
    /// The process could not be started at all (missing binary, bad permissions).
    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    /// The process ran but exited unsuccessfully.
    #[error("{tool} exited with {}: {}", describe_exit(.code), .stderr.trim())]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("{0} returned no output")]
    EmptyOutput(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),
}

/// Input problems reported to the user in a message box.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Enter a video URL.")]
    EmptyUrl,
    #[error("Choose a destination folder.")]
    EmptyDirectory,
    #[error("Choose both a video and an audio format.")]
    MissingFormat,
    #[error("Thread count must be greater than 0.")]
    InvalidThreads,
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "a signal".to_string(),
    }
}
