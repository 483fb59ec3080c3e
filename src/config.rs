//! Recorder configuration
//!
//! Every field has a default so a partial (or absent) config file is fine.

use crate::recorder::error::{RecordingError, RecordingResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an optional JSON config file.
pub const CONFIG_ENV: &str = "INPUT_REPLAY_CONFIG";

/// Environment variable overriding the recording file location.
pub const RECORDING_FILE_ENV: &str = "INPUT_REPLAY_FILE";

const DEFAULT_RECORDING_FILE: &str = "last_recording.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderConfig {
    /// Where the last recording is persisted
    pub recording_path: PathBuf,
    /// Minimum spacing between admitted pointer moves
    pub min_move_interval_ms: u64,
    /// Window in which an identical scroll signature is treated as a duplicate
    pub scroll_dedupe_window_ms: u64,
    /// Decimal places kept when comparing scroll deltas
    pub scroll_signature_decimals: u32,
    /// Longest single sleep while replay waits for the next event
    pub replay_poll_slice_ms: u64,
    /// Upper bound on joining a worker or hook thread
    pub shutdown_timeout_ms: u64,
    /// Upper bound on waiting for the wheel hook to report it is installed
    pub hook_install_timeout_ms: u64,
    /// Capacity of the queue between input callbacks and the capture worker
    pub capture_queue_capacity: usize,
    /// Try to install the high-resolution wheel hook where supported
    pub high_resolution_scroll: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            recording_path: default_recording_path(),
            min_move_interval_ms: 3,
            scroll_dedupe_window_ms: 4,
            scroll_signature_decimals: 3,
            replay_poll_slice_ms: 2,
            shutdown_timeout_ms: 1000,
            hook_install_timeout_ms: 1000,
            capture_queue_capacity: 8192,
            high_resolution_scroll: true,
        }
    }
}

impl RecorderConfig {
    /// Build the config from the environment.
    ///
    /// A config file that cannot be read or parsed is reported and ignored.
    pub fn from_env() -> Self {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)).unwrap_or_else(|e| {
                tracing::warn!("Ignoring config file {:?}: {}", path, e);
                Self::default()
            }),
            None => Self::default(),
        };

        if let Some(path) = std::env::var_os(RECORDING_FILE_ENV) {
            config.recording_path = PathBuf::from(path);
        }

        config
    }

    pub fn load(path: &Path) -> RecordingResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RecordingResult<()> {
        if self.capture_queue_capacity == 0 {
            return Err(RecordingError::ConfigurationError(
                "captureQueueCapacity must be greater than zero".to_string(),
            ));
        }
        if self.replay_poll_slice_ms == 0 {
            return Err(RecordingError::ConfigurationError(
                "replayPollSliceMs must be greater than zero".to_string(),
            ));
        }
        if self.recording_path.as_os_str().is_empty() {
            return Err(RecordingError::ConfigurationError(
                "recordingPath must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn replay_poll_slice(&self) -> Duration {
        Duration::from_millis(self.replay_poll_slice_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn hook_install_timeout(&self) -> Duration {
        Duration::from_millis(self.hook_install_timeout_ms)
    }
}

fn default_recording_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_RECORDING_FILE)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RECORDING_FILE))
}
