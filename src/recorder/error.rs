//! Error types shared by capture, persistence and replay.

use thiserror::Error;

/// Errors that can occur while recording or replaying input
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("Busy: {0}")]
    Busy(String),

    #[error("No recorded data to replay")]
    NothingToReplay,

    #[error("Platform error: {0}")]
    PlatformError(String),

    #[error("Hook installation failed: {0}")]
    HookInstall(String),

    #[error("Input injection failed: {0}")]
    Injection(String),

    #[error("Unresolved key: {0}")]
    UnresolvedKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Result type for recording operations
pub type RecordingResult<T> = Result<T, RecordingError>;
