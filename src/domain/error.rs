use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Download service error: {0}")]
    Service(String),

    #[error("Download failed: {}", .reason.as_deref().unwrap_or("no reason given"))]
    DownloadFailed { reason: Option<String> },

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Installer error: {0}")]
    Install(String),

    #[error("Launch error: {0}")]
    Launch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker queue is full")]
    QueueFull,

    #[error("Worker has been shut down")]
    WorkerShutdown,
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}
