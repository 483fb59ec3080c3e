//! Replay of recorded timelines through synthetic input.

pub mod emitter;
pub mod held;
pub mod scheduler;
pub mod scroll;

pub use emitter::{EnigoBackend, InputBackend, InputEmitter};
pub use scheduler::{replay_events, ReplayOptions, ReplayReport, ReplayScheduler};
