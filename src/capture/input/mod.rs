//! Input event model and capture pipeline
//!
//! Raw input from the listener is stamped, queued, filtered and written into
//! one timeline by a single capture worker.

pub mod channel;
pub mod filters;
pub mod keys;
pub mod types;

pub use channel::{CaptureOutcome, CaptureSession, CaptureSessionOptions, CaptureSink, PointerSource};
pub use filters::{CaptureFilters, FilterSettings};
pub use types::{InputEvent, KeyAction, KeyPayload, MouseButton};
