//! Recording coordinator
//!
//! Owns the idle/recording/replaying state machine, the recording store, the
//! capture session and the replay thread. Every transition happens under the
//! phase lock; worker threads report back through the shared state when they
//! finish on their own (Escape, end of timeline).

use crate::capture::input::channel::{CaptureOutcome, CaptureSession, CaptureSessionOptions, PointerSource};
use crate::capture::input::filters::FilterSettings;
use crate::capture::listener::{GlobalListener, InputRouter};
use crate::capture::WheelHook;
use crate::config::RecorderConfig;
use crate::recorder::error::{RecordingError, RecordingResult};
use crate::recorder::state::{ControlFlags, ControlNotice, RecorderPhase, RecorderStatus};
use crate::recorder::store::RecordingStore;
use crate::replay::emitter::InputBackend;
use crate::replay::scheduler::{ReplayOptions, ReplayReport, ReplayScheduler};
use crate::utils::{join_with_timeout, spawn_named};
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

const STATUS_RECORDING: &str = "Recording... move/click/scroll then press Esc";
const STATUS_REPLAYING: &str = "Replaying...";

/// State reached from worker threads as well as from callers.
struct Shared {
    phase: Mutex<RecorderPhase>,
    status: Mutex<String>,
    store: Mutex<RecordingStore>,
    notices: Mutex<Option<UnboundedSender<ControlNotice>>>,
}

impl Shared {
    fn set_status(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("Status: {}", message);
        *self.status.lock() = message;
    }

    fn notify(&self, notice: ControlNotice) {
        if let Some(tx) = self.notices.lock().as_ref() {
            let _ = tx.send(notice);
        }
    }

    fn warn(&self, message: String) {
        tracing::warn!("{}", message);
        self.notify(ControlNotice::Warning(message));
    }
}

pub struct RecordingCoordinator {
    config: RecorderConfig,
    backend: Arc<dyn InputBackend>,
    flags: Arc<ControlFlags>,
    router: Arc<InputRouter>,
    shared: Arc<Shared>,
    capture: Mutex<Option<CaptureSession>>,
    replay: Mutex<Option<JoinHandle<()>>>,
    listener: Mutex<Option<GlobalListener>>,
}

impl RecordingCoordinator {
    /// Create a coordinator and load any previous recording.
    pub fn new(config: RecorderConfig, backend: Arc<dyn InputBackend>) -> Self {
        let store = RecordingStore::open(config.recording_path.clone());
        let status = if store.is_empty() {
            "Ready".to_string()
        } else {
            format!("Ready (loaded {} saved events)", store.len())
        };
        tracing::info!("Recorder ready, {} saved events", store.len());

        let flags = Arc::new(ControlFlags::default());
        let router = Arc::new(InputRouter::new(flags.clone()));

        Self {
            config,
            backend,
            flags,
            router,
            shared: Arc::new(Shared {
                phase: Mutex::new(RecorderPhase::Idle),
                status: Mutex::new(status),
                store: Mutex::new(store),
                notices: Mutex::new(None),
            }),
            capture: Mutex::new(None),
            replay: Mutex::new(None),
            listener: Mutex::new(None),
        }
    }

    /// Send control notices to `tx` from now on.
    pub fn with_notices(self, tx: UnboundedSender<ControlNotice>) -> Self {
        *self.shared.notices.lock() = Some(tx);
        self
    }

    pub fn router(&self) -> Arc<InputRouter> {
        self.router.clone()
    }

    pub fn flags(&self) -> Arc<ControlFlags> {
        self.flags.clone()
    }

    /// Start the process-wide listener that feeds capture and watches for Esc.
    pub fn attach_global_listener(&self) -> RecordingResult<()> {
        let mut listener = self.listener.lock();
        if listener.is_some() {
            return Ok(());
        }
        *listener = Some(GlobalListener::start(self.router.clone())?);
        Ok(())
    }

    pub fn phase(&self) -> RecorderPhase {
        *self.shared.phase.lock()
    }

    pub fn status_message(&self) -> String {
        self.shared.status.lock().clone()
    }

    pub fn event_count(&self) -> usize {
        self.shared.store.lock().len()
    }

    pub fn status(&self) -> RecorderStatus {
        RecorderStatus {
            phase: self.phase(),
            message: self.status_message(),
            event_count: self.event_count(),
        }
    }

    /// Copy of the stored timeline.
    pub fn timeline(&self) -> Vec<crate::capture::input::types::InputEvent> {
        self.shared.store.lock().snapshot()
    }

    fn reject(&self, error: RecordingError) -> RecordingError {
        self.shared.set_status(error.to_string());
        error
    }

    fn join_stale_capture(&self) {
        if let Some(session) = self.capture.lock().take() {
            session.finish(self.config.shutdown_timeout());
        }
    }

    fn join_stale_replay(&self) {
        if let Some(handle) = self.replay.lock().take() {
            join_with_timeout(handle, self.config.shutdown_timeout());
        }
    }

    pub fn start_recording(&self) -> RecordingResult<()> {
        let mut phase = self.shared.phase.lock();
        match *phase {
            RecorderPhase::Recording => return Err(self.reject(RecordingError::AlreadyRecording)),
            RecorderPhase::Replaying => {
                return Err(self.reject(RecordingError::Busy("replay in progress".to_string())))
            }
            RecorderPhase::Idle => {}
        }

        // A session stopped by Esc has finished but was never joined.
        self.join_stale_capture();

        let initial_position = self
            .backend
            .cursor_position()
            .or_else(|| self.router.last_pointer())
            .unwrap_or((0, 0));

        let wheel_hook = if self.config.high_resolution_scroll {
            match WheelHook::install(self.router.clone(), self.config.hook_install_timeout()) {
                Ok(hook) => {
                    tracing::info!("High-resolution wheel capture active");
                    Some(hook)
                }
                Err(e) => {
                    tracing::warn!("Falling back to coarse wheel capture: {}", e);
                    None
                }
            }
        } else {
            None
        };
        self.flags
            .high_res_scroll
            .store(wheel_hook.is_some(), Ordering::SeqCst);

        let backend = self.backend.clone();
        let pointer: Arc<dyn PointerSource> = Arc::new(move || backend.cursor_position());

        let shared = self.shared.clone();
        let flags = self.flags.clone();
        let router = self.router.clone();
        let on_finish = Box::new(move |outcome: CaptureOutcome| {
            router.detach();
            flags.recording.store(false, Ordering::SeqCst);
            flags.high_res_scroll.store(false, Ordering::SeqCst);
            finish_recording(&shared, outcome);
        });

        let session = CaptureSession::start(
            CaptureSessionOptions {
                settings: FilterSettings::from(&self.config),
                queue_capacity: self.config.capture_queue_capacity,
                initial_position,
                hook_timeout: self.config.shutdown_timeout(),
            },
            pointer,
            wheel_hook,
            on_finish,
        )?;

        self.router.attach(session.sink());
        *self.capture.lock() = Some(session);
        self.flags.cancel.store(false, Ordering::SeqCst);
        self.flags.recording.store(true, Ordering::SeqCst);
        *phase = RecorderPhase::Recording;
        drop(phase);

        self.shared.set_status(STATUS_RECORDING);
        self.shared.notify(ControlNotice::RecordingStarted);
        Ok(())
    }

    /// Stop recording and wait for the timeline to be stored.
    ///
    /// Returns the number of events in the new recording.
    pub fn stop_recording(&self) -> RecordingResult<usize> {
        if self.phase() != RecorderPhase::Recording {
            return Err(self.reject(RecordingError::NotRecording));
        }

        self.flags.recording.store(false, Ordering::SeqCst);
        let session = self.capture.lock().take();
        if let Some(session) = session {
            if !session.finish(self.config.shutdown_timeout()) {
                return Err(RecordingError::PlatformError(
                    "Capture worker did not finish in time".to_string(),
                ));
            }
        }
        Ok(self.event_count())
    }

    /// Wait for a recording stopped elsewhere (Esc) to be stored.
    pub fn wait_for_recording(&self, timeout: Duration) -> bool {
        match self.capture.lock().take() {
            Some(session) => session.finish(timeout),
            None => true,
        }
    }

    /// Start replaying the stored timeline on a background thread.
    ///
    /// Returns the number of events that will be replayed.
    pub fn start_replay(&self) -> RecordingResult<usize> {
        let mut phase = self.shared.phase.lock();
        match *phase {
            RecorderPhase::Recording => {
                return Err(self.reject(RecordingError::Busy("recording in progress".to_string())))
            }
            RecorderPhase::Replaying => {
                return Err(self.reject(RecordingError::Busy("replay already running".to_string())))
            }
            RecorderPhase::Idle => {}
        }

        let events = self.shared.store.lock().snapshot();
        if events.is_empty() {
            return Err(self.reject(RecordingError::NothingToReplay));
        }

        self.join_stale_replay();

        let count = events.len();
        let backend = self.backend.clone();
        let flags = self.flags.clone();
        let shared = self.shared.clone();
        let options = ReplayOptions {
            poll_slice: self.config.replay_poll_slice(),
        };

        self.flags.cancel.store(false, Ordering::SeqCst);
        self.flags.replaying.store(true, Ordering::SeqCst);

        let handle = spawn_named("input-replay", move || {
            let report = match backend.emitter() {
                Ok(mut emitter) => {
                    Some(ReplayScheduler::new(emitter.as_mut(), &flags.cancel, options).run(&events))
                }
                Err(e) => {
                    shared.warn(format!("Replay failed: {}", e));
                    None
                }
            };
            finish_replay(&shared, &flags, report);
        });

        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                self.flags.replaying.store(false, Ordering::SeqCst);
                return Err(RecordingError::PlatformError(format!(
                    "Failed to spawn replay thread: {}",
                    e
                )));
            }
        };

        *self.replay.lock() = Some(handle);
        *phase = RecorderPhase::Replaying;
        drop(phase);

        self.shared.set_status(STATUS_REPLAYING);
        self.shared.notify(ControlNotice::ReplayStarted { events: count });
        Ok(count)
    }

    /// Ask a running replay to stop. Returns `false` if nothing was replaying.
    pub fn cancel_replay(&self) -> bool {
        if !self.flags.is_replaying() {
            return false;
        }
        self.flags.request_cancel();
        true
    }

    /// Wait (bounded) for the replay thread to exit.
    pub fn wait_for_replay(&self, timeout: Duration) -> bool {
        match self.replay.lock().take() {
            Some(handle) => join_with_timeout(handle, timeout),
            None => true,
        }
    }

    /// Stop everything and join every thread within the configured timeout.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down recorder");
        let timeout = self.config.shutdown_timeout();

        self.flags.recording.store(false, Ordering::SeqCst);
        self.flags.request_cancel();

        if let Some(session) = self.capture.lock().take() {
            session.finish(timeout);
        }
        self.wait_for_replay(timeout);

        match self.listener.lock().take() {
            Some(listener) => {
                listener.shutdown(timeout);
            }
            None => self.router.deactivate(),
        }
    }
}

fn finish_recording(shared: &Shared, outcome: CaptureOutcome) {
    let count = outcome.events.len();
    let mut store = shared.store.lock();
    store.replace(outcome.events);
    let saved = store.save();
    drop(store);

    match saved {
        Ok(()) => shared.set_status(format!("Stopped. Captured {} events", count)),
        Err(e) => {
            shared.set_status(format!("Stopped. Captured {} events (save failed: {})", count, e));
            shared.warn(format!("Failed to save recording: {}", e));
        }
    }
    if outcome.dropped > 0 {
        shared.warn(format!("{} inputs were dropped during capture", outcome.dropped));
    }

    *shared.phase.lock() = RecorderPhase::Idle;
    shared.notify(ControlNotice::RecordingStopped { events: count });
}

fn finish_replay(shared: &Shared, flags: &ControlFlags, report: Option<ReplayReport>) {
    {
        let mut phase = shared.phase.lock();
        flags.replaying.store(false, Ordering::SeqCst);
        flags.cancel.store(false, Ordering::SeqCst);
        *phase = RecorderPhase::Idle;
    }

    match report {
        Some(report) => {
            shared.set_status(report.status_line());
            shared.notify(ControlNotice::ReplayFinished(report));
        }
        None => shared.set_status("Replay failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::input::types::{InputEvent, KeyPayload, MouseButton};
    use crate::replay::emitter::testing::{Emitted, MockBackend};
    use rdev::{Event, EventType};
    use std::time::{Instant, SystemTime};
    use tempfile::TempDir;

    fn coordinator(dir: &TempDir, backend: Arc<MockBackend>) -> RecordingCoordinator {
        let config = RecorderConfig {
            recording_path: dir.path().join("recording.json"),
            high_resolution_scroll: false,
            ..Default::default()
        };
        RecordingCoordinator::new(config, backend)
    }

    fn feed(router: &InputRouter, event_type: EventType) {
        router.handle(&Event {
            time: SystemTime::now(),
            name: None,
            event_type,
        });
    }

    fn sleep_until(start: Instant, secs: f64) {
        let target = start + Duration::from_secs_f64(secs);
        let now = Instant::now();
        if target > now {
            std::thread::sleep(target - now);
        }
    }

    #[test]
    fn test_new_reports_ready() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(&dir, Arc::new(MockBackend::at(0, 0)));
        let status = coordinator.status();
        assert_eq!(status.phase, RecorderPhase::Idle);
        assert_eq!(status.message, "Ready");
        assert_eq!(status.event_count, 0);
    }

    #[test]
    fn test_record_then_replay_scaled_scenario() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(MockBackend::at(10, 10));
        let coordinator = coordinator(&dir, backend.clone());
        let router = coordinator.router();

        let start = Instant::now();
        coordinator.start_recording().unwrap();
        assert_eq!(coordinator.phase(), RecorderPhase::Recording);

        sleep_until(start, 0.05);
        feed(&router, EventType::MouseMove { x: 50.0, y: 50.0 });
        sleep_until(start, 0.06);
        feed(&router, EventType::ButtonPress(rdev::Button::Left));
        sleep_until(start, 0.065);
        feed(&router, EventType::ButtonRelease(rdev::Button::Left));
        backend.set_position(50, 50);
        sleep_until(start, 0.1);

        assert_eq!(coordinator.stop_recording().unwrap(), 5);
        assert_eq!(coordinator.phase(), RecorderPhase::Idle);
        assert_eq!(coordinator.status_message(), "Stopped. Captured 5 events");

        let timeline = coordinator.timeline();
        let kinds: Vec<_> = timeline.iter().map(InputEvent::kind).collect();
        assert_eq!(kinds, vec!["move", "move", "click", "click", "move"]);
        assert_eq!(timeline[0].position(), Some((10, 10)));
        assert_eq!(timeline[4].position(), Some((50, 50)));

        // Persisted next to the in-memory copy.
        let reopened = RecordingStore::open(dir.path().join("recording.json"));
        assert_eq!(reopened.events(), timeline.as_slice());

        let replay_start = Instant::now();
        assert_eq!(coordinator.start_replay().unwrap(), 5);
        assert!(coordinator.wait_for_replay(Duration::from_secs(5)));
        let elapsed = replay_start.elapsed();

        assert!(elapsed >= Duration::from_millis(90), "{:?}", elapsed);
        assert_eq!(coordinator.phase(), RecorderPhase::Idle);
        assert!(coordinator.status_message().starts_with("Replay finished"));

        let emitted = backend.emitted();
        assert_eq!(emitted.last(), Some(&Emitted::Move(50, 50)));
        assert!(emitted.contains(&Emitted::Button(MouseButton::Left, true)));
        assert!(emitted.contains(&Emitted::Button(MouseButton::Left, false)));
    }

    #[test]
    fn test_transitions_rejected_with_status() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(&dir, Arc::new(MockBackend::at(0, 0)));

        assert!(matches!(
            coordinator.stop_recording(),
            Err(RecordingError::NotRecording)
        ));
        assert!(matches!(
            coordinator.start_replay(),
            Err(RecordingError::NothingToReplay)
        ));
        assert_eq!(coordinator.status_message(), "No recorded data to replay");

        coordinator.start_recording().unwrap();
        assert!(matches!(
            coordinator.start_recording(),
            Err(RecordingError::AlreadyRecording)
        ));
        assert!(matches!(coordinator.start_replay(), Err(RecordingError::Busy(_))));
        assert_eq!(coordinator.phase(), RecorderPhase::Recording);

        coordinator.stop_recording().unwrap();
        assert_eq!(coordinator.phase(), RecorderPhase::Idle);
    }

    #[test]
    fn test_escape_stops_recording() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(&dir, Arc::new(MockBackend::at(5, 5)));
        let router = coordinator.router();

        coordinator.start_recording().unwrap();
        feed(&router, EventType::KeyPress(rdev::Key::KeyH));
        feed(&router, EventType::KeyRelease(rdev::Key::KeyH));
        feed(&router, EventType::KeyPress(rdev::Key::Escape));

        assert!(coordinator.wait_for_recording(Duration::from_secs(2)));
        assert_eq!(coordinator.phase(), RecorderPhase::Idle);

        let timeline = coordinator.timeline();
        assert_eq!(timeline.len(), 4);
        assert!(timeline.iter().all(|e| match e {
            InputEvent::Key { key, .. } => key.as_ref() == Some(&KeyPayload::char('h')),
            _ => true,
        }));

        // Input after stop is ignored.
        feed(&router, EventType::KeyPress(rdev::Key::KeyJ));
        assert_eq!(coordinator.event_count(), 4);
    }

    #[test]
    fn test_escape_cancels_replay_and_releases_held_keys() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(MockBackend::at(0, 0));
        let coordinator = coordinator(&dir, backend.clone());
        let router = coordinator.router();

        coordinator.start_recording().unwrap();
        feed(&router, EventType::KeyPress(rdev::Key::ShiftLeft));
        std::thread::sleep(Duration::from_millis(300));
        feed(&router, EventType::KeyRelease(rdev::Key::ShiftLeft));
        coordinator.stop_recording().unwrap();

        coordinator.start_replay().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(coordinator.phase(), RecorderPhase::Replaying);
        feed(&router, EventType::KeyPress(rdev::Key::Escape));
        assert!(coordinator.wait_for_replay(Duration::from_secs(2)));

        assert_eq!(coordinator.phase(), RecorderPhase::Idle);
        assert!(coordinator.status_message().starts_with("Replay stopped"));
        let shift = KeyPayload::special("shift");
        let emitted = backend.emitted();
        assert_eq!(emitted.last(), Some(&Emitted::Key(shift.clone(), false)));
        assert_eq!(
            emitted
                .iter()
                .filter(|e| **e == Emitted::Key(shift.clone(), false))
                .count(),
            1
        );
    }

    #[test]
    fn test_notices_are_sent() {
        let dir = TempDir::new().unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let coordinator = coordinator(&dir, Arc::new(MockBackend::at(0, 0))).with_notices(tx);

        coordinator.start_recording().unwrap();
        coordinator.stop_recording().unwrap();

        assert_eq!(rx.try_recv().unwrap(), ControlNotice::RecordingStarted);
        assert_eq!(
            rx.try_recv().unwrap(),
            ControlNotice::RecordingStopped { events: 2 }
        );
    }

    #[test]
    fn test_save_failure_keeps_timeline_in_memory() {
        let dir = TempDir::new().unwrap();
        let config = RecorderConfig {
            recording_path: dir.path().join("missing").join("recording.json"),
            high_resolution_scroll: false,
            ..Default::default()
        };
        let coordinator = RecordingCoordinator::new(config, Arc::new(MockBackend::at(1, 1)));

        coordinator.start_recording().unwrap();
        assert_eq!(coordinator.stop_recording().unwrap(), 2);
        assert!(coordinator.status_message().contains("save failed"));
        assert_eq!(coordinator.phase(), RecorderPhase::Idle);
    }

    #[test]
    fn test_loaded_recording_reported_on_startup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recording.json");
        crate::recorder::store::save_events(
            &path,
            &[
                InputEvent::Move { time: 0.0, x: 1, y: 1 },
                InputEvent::Move { time: 0.1, x: 2, y: 2 },
            ],
        )
        .unwrap();

        let coordinator = coordinator(&dir, Arc::new(MockBackend::at(0, 0)));
        assert_eq!(coordinator.status_message(), "Ready (loaded 2 saved events)");
        assert_eq!(coordinator.event_count(), 2);
    }

    #[test]
    fn test_shutdown_cancels_replay() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recording.json");
        crate::recorder::store::save_events(
            &path,
            &[
                InputEvent::Move { time: 0.0, x: 1, y: 1 },
                InputEvent::Move { time: 30.0, x: 2, y: 2 },
            ],
        )
        .unwrap();
        let coordinator = coordinator(&dir, Arc::new(MockBackend::at(0, 0)));

        coordinator.start_replay().unwrap();
        let started = Instant::now();
        coordinator.shutdown();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(coordinator.phase(), RecorderPhase::Idle);
        assert!(!coordinator.flags().is_replaying());
    }
}
