//! Recorder control surface
//!
//! Ties capture, persistence and replay together behind one coordinator.

pub mod coordinator;
pub mod error;
pub mod state;
pub mod store;

pub use coordinator::RecordingCoordinator;
pub use error::{RecordingError, RecordingResult};
pub use state::{ControlFlags, ControlNotice, RecorderPhase, RecorderStatus};
pub use store::RecordingStore;
