//! Input capture
//!
//! A process-wide listener feeds a router, the router feeds the active
//! capture session, and on Windows a wheel hook adds fractional scroll.

pub mod input;
pub mod listener;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(target_os = "windows"))]
mod fallback;

#[cfg(target_os = "windows")]
pub use windows::WheelHook;

#[cfg(not(target_os = "windows"))]
pub use fallback::WheelHook;

pub use input::{CaptureOutcome, CaptureSession, CaptureSessionOptions, CaptureSink};
pub use listener::{CancelAction, GlobalListener, InputRouter};
