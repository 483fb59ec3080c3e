//! Command handlers
//!
//! The async entry points a presentation layer calls into.

pub mod recording;
