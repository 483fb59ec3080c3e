//! Wheel hook for platforms without a high-resolution source.
//!
//! Installation always fails, so capture degrades to the listener's
//! whole-notch wheel events.

use crate::capture::listener::InputRouter;
use crate::recorder::error::{RecordingError, RecordingResult};
use std::sync::Arc;
use std::time::Duration;

pub struct WheelHook {
    _private: (),
}

impl WheelHook {
    pub fn install(_router: Arc<InputRouter>, _timeout: Duration) -> RecordingResult<Self> {
        Err(RecordingError::HookInstall(
            "High-resolution wheel capture is only available on Windows".to_string(),
        ))
    }

    pub fn stop(self, _timeout: Duration) -> bool {
        true
    }
}
