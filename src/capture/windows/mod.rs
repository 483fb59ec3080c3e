//! Windows capture implementations
//!
//! Adds fractional wheel deltas on top of the global listener.

pub mod input;

pub use input::WheelHook;
