//! Recording-related commands
//!
//! The operations a presentation layer may call. Coordinator calls can block
//! (hook installation, joining workers), so each runs on the blocking pool.

use crate::recorder::error::RecordingResult;
use crate::recorder::state::RecorderStatus;
use crate::recorder::RecordingCoordinator;
use std::sync::Arc;

/// Application state for recording
#[derive(Clone)]
pub struct RecorderState {
    pub coordinator: Arc<RecordingCoordinator>,
}

impl RecorderState {
    pub fn new(coordinator: RecordingCoordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
        }
    }
}

async fn run_blocking<T, F>(state: &RecorderState, f: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce(&RecordingCoordinator) -> RecordingResult<T> + Send + 'static,
{
    let coordinator = state.coordinator.clone();
    tokio::task::spawn_blocking(move || f(&coordinator))
        .await
        .map_err(|e| format!("Recorder task failed: {}", e))?
        .map_err(|e| e.to_string())
}

/// Start recording
pub async fn start_recording(state: &RecorderState) -> Result<(), String> {
    run_blocking(state, |c| c.start_recording()).await
}

/// Stop recording, returning the number of captured events
pub async fn stop_recording(state: &RecorderState) -> Result<usize, String> {
    run_blocking(state, |c| c.stop_recording()).await
}

/// Replay the last recording, returning the number of events scheduled
pub async fn start_replay(state: &RecorderState) -> Result<usize, String> {
    run_blocking(state, |c| c.start_replay()).await
}

/// Ask a running replay to stop
pub async fn cancel_replay(state: &RecorderState) -> Result<bool, String> {
    Ok(state.coordinator.cancel_replay())
}

/// Get current recorder status
pub async fn get_status(state: &RecorderState) -> Result<RecorderStatus, String> {
    Ok(state.coordinator.status())
}

/// Stop all activity and join every worker thread
pub async fn shutdown(state: &RecorderState) -> Result<(), String> {
    run_blocking(state, |c| {
        c.shutdown();
        Ok(())
    })
    .await
}
