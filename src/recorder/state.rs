//! Control-surface state shared across threads.

use crate::replay::scheduler::ReplayReport;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// Mutually exclusive recorder phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecorderPhase {
    Idle,
    Recording,
    Replaying,
}

impl std::fmt::Display for RecorderPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecorderPhase::Idle => write!(f, "idle"),
            RecorderPhase::Recording => write!(f, "recording"),
            RecorderPhase::Replaying => write!(f, "replaying"),
        }
    }
}

/// Lock-free flags read on the input callback and replay hot paths.
#[derive(Debug, Default)]
pub struct ControlFlags {
    pub recording: AtomicBool,
    pub replaying: AtomicBool,
    /// Raised by the cancel key or shutdown, polled by replay
    pub cancel: AtomicBool,
    /// Set while the high-resolution wheel hook owns scroll capture
    pub high_res_scroll: AtomicBool,
}

impl ControlFlags {
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

/// Events pushed to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlNotice {
    RecordingStarted,
    RecordingStopped { events: usize },
    ReplayStarted { events: usize },
    ReplayFinished(ReplayReport),
    Warning(String),
}

/// Snapshot returned to callers asking for status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderStatus {
    pub phase: RecorderPhase,
    pub message: String,
    pub event_count: usize,
}
