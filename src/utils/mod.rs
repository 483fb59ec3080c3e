//! Small shared helpers.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Spawn a named thread.
pub fn spawn_named<F>(name: &str, f: F) -> std::io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new().name(name.to_string()).spawn(f)
}

/// Join `handle` if it exits within `timeout`.
///
/// Returns `false` (and leaves the thread detached) if the deadline passes.
pub fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration) -> bool {
    let name = handle.thread().name().unwrap_or("<unnamed>").to_string();
    let deadline = Instant::now() + timeout;

    while !handle.is_finished() {
        if Instant::now() >= deadline {
            tracing::warn!("Thread {} did not exit within {:?}, detaching", name, timeout);
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    if handle.join().is_err() {
        tracing::error!("Thread {} panicked", name);
    }
    true
}
