//! Global input listener.
//!
//! One rdev listener runs for the life of the process. Its callback is
//! routed through `InputRouter`, which forwards input to the active capture
//! sink while recording and interprets the reserved cancel key in every
//! phase. The callback only reads atomics, takes one short lock and does a
//! non-blocking queue push.

use crate::capture::input::channel::{CaptureSink, RawInputKind};
use crate::capture::input::keys::{is_cancel_key, payload_from_rdev};
use crate::capture::input::types::{KeyAction, MouseButton};
use crate::recorder::error::{RecordingError, RecordingResult};
use crate::recorder::state::ControlFlags;
use crate::utils::{join_with_timeout, spawn_named};
use parking_lot::Mutex;
use rdev::{Event, EventType};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// What the cancel key did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAction {
    StopRecording,
    CancelReplay,
    Ignored,
}

pub struct InputRouter {
    flags: Arc<ControlFlags>,
    sink: Mutex<Option<CaptureSink>>,
    pointer: Mutex<Option<(f64, f64)>>,
    active: AtomicBool,
    seen: AtomicU64,
}

impl InputRouter {
    pub fn new(flags: Arc<ControlFlags>) -> Self {
        Self {
            flags,
            sink: Mutex::new(None),
            pointer: Mutex::new(None),
            active: AtomicBool::new(true),
            seen: AtomicU64::new(0),
        }
    }

    pub fn flags(&self) -> &Arc<ControlFlags> {
        &self.flags
    }

    pub fn attach(&self, sink: CaptureSink) {
        *self.sink.lock() = Some(sink);
    }

    pub fn detach(&self) {
        *self.sink.lock() = None;
    }

    /// Stop routing anything. Used at shutdown for listeners that cannot be
    /// joined promptly.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.detach();
    }

    /// Last pointer position reported by the listener.
    pub fn last_pointer(&self) -> Option<(i32, i32)> {
        self.pointer.lock().map(|(x, y)| (x as i32, y as i32))
    }

    pub fn events_seen(&self) -> u64 {
        self.seen.load(Ordering::Relaxed)
    }

    fn submit(&self, kind: RawInputKind) {
        if !self.flags.is_recording() {
            return;
        }
        if let Some(sink) = self.sink.lock().as_ref() {
            sink.submit(kind);
        }
    }

    /// Scroll from the high-resolution hook, in (fractional) wheel units.
    pub fn submit_high_res_wheel(&self, x: f64, y: f64, dx: f64, dy: f64) {
        if !self.active.load(Ordering::Relaxed) {
            return;
        }
        self.submit(RawInputKind::Wheel { x, y, dx, dy });
    }

    /// Reserved-key handling, valid in any phase.
    pub fn cancel(&self) -> CancelAction {
        if self.flags.is_replaying() {
            self.flags.request_cancel();
            tracing::info!("Cancel key: stopping replay");
            return CancelAction::CancelReplay;
        }
        if self
            .flags
            .recording
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            if let Some(sink) = self.sink.lock().as_ref() {
                sink.request_finish();
            }
            tracing::info!("Cancel key: stopping recording");
            return CancelAction::StopRecording;
        }
        CancelAction::Ignored
    }

    fn pointer_or_origin(&self) -> (f64, f64) {
        self.pointer.lock().unwrap_or((0.0, 0.0))
    }

    pub fn handle(&self, event: &Event) {
        if !self.active.load(Ordering::Relaxed) {
            return;
        }
        self.seen.fetch_add(1, Ordering::Relaxed);

        match event.event_type {
            EventType::MouseMove { x, y } => {
                *self.pointer.lock() = Some((x, y));
                self.submit(RawInputKind::Move { x, y });
            }
            EventType::ButtonPress(button) | EventType::ButtonRelease(button) => {
                let Some(button) = map_button(button) else {
                    tracing::trace!("Ignoring unmapped button {:?}", button);
                    return;
                };
                let pressed = matches!(event.event_type, EventType::ButtonPress(_));
                let (x, y) = self.pointer_or_origin();
                self.submit(RawInputKind::Button {
                    x,
                    y,
                    button,
                    pressed,
                });
            }
            EventType::Wheel { delta_x, delta_y } => {
                // The hook reports the same ticks with full precision.
                if self.flags.high_res_scroll.load(Ordering::Relaxed) {
                    return;
                }
                let (x, y) = self.pointer_or_origin();
                self.submit(RawInputKind::Wheel {
                    x,
                    y,
                    dx: delta_x as f64,
                    dy: delta_y as f64,
                });
            }
            EventType::KeyPress(key) => {
                if is_cancel_key(&key) {
                    self.cancel();
                    return;
                }
                self.submit(RawInputKind::Key {
                    action: KeyAction::Press,
                    key: payload_from_rdev(&key),
                });
            }
            EventType::KeyRelease(key) => {
                if is_cancel_key(&key) {
                    return;
                }
                self.submit(RawInputKind::Key {
                    action: KeyAction::Release,
                    key: payload_from_rdev(&key),
                });
            }
        }
    }
}

fn map_button(button: rdev::Button) -> Option<MouseButton> {
    match button {
        rdev::Button::Left => Some(MouseButton::Left),
        rdev::Button::Right => Some(MouseButton::Right),
        rdev::Button::Middle => Some(MouseButton::Middle),
        rdev::Button::Unknown(1) => Some(MouseButton::Back),
        rdev::Button::Unknown(2) => Some(MouseButton::Forward),
        rdev::Button::Unknown(_) => None,
    }
}

/// Handle to the process-wide listener thread.
pub struct GlobalListener {
    router: Arc<InputRouter>,
    thread: Option<JoinHandle<()>>,
    #[cfg(target_os = "windows")]
    thread_id: Arc<std::sync::atomic::AtomicU32>,
}

impl GlobalListener {
    pub fn start(router: Arc<InputRouter>) -> RecordingResult<Self> {
        #[cfg(target_os = "windows")]
        let thread_id = Arc::new(std::sync::atomic::AtomicU32::new(0));
        #[cfg(target_os = "windows")]
        let thread_id_slot = thread_id.clone();

        let callback_router = router.clone();
        let thread = spawn_named("input-listener", move || {
            #[cfg(target_os = "windows")]
            thread_id_slot.store(
                crate::capture::windows::input::current_thread_id(),
                Ordering::SeqCst,
            );

            tracing::info!("Global input listener started");
            if let Err(error) = rdev::listen(move |event| callback_router.handle(&event)) {
                tracing::error!("Global input listener failed: {:?}", error);
            }
            tracing::info!("Global input listener stopped");
        })
        .map_err(|e| RecordingError::PlatformError(format!("Failed to spawn listener: {}", e)))?;

        Ok(Self {
            router,
            thread: Some(thread),
            #[cfg(target_os = "windows")]
            thread_id,
        })
    }

    /// Stop routing and wait (bounded) for the listener thread.
    ///
    /// On Windows the listener's message loop is told to quit. rdev offers no
    /// way to end its loop on other platforms, so there the thread is left
    /// inert after the timeout.
    pub fn shutdown(mut self, timeout: Duration) -> bool {
        self.router.deactivate();

        #[cfg(target_os = "windows")]
        {
            let id = self.thread_id.load(Ordering::SeqCst);
            if id != 0 {
                crate::capture::windows::input::post_quit(id);
            }
        }

        match self.thread.take() {
            Some(thread) => join_with_timeout(thread, timeout),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::input::channel::{CaptureSession, CaptureSessionOptions, CaptureOutcome, PointerSource};
    use crate::capture::input::filters::FilterSettings;
    use crate::capture::input::types::{InputEvent, KeyPayload};
    use std::time::SystemTime;

    fn event(event_type: EventType) -> Event {
        Event {
            time: SystemTime::now(),
            name: None,
            event_type,
        }
    }

    fn recording_router() -> (Arc<InputRouter>, CaptureSession, Arc<Mutex<Option<CaptureOutcome>>>) {
        let flags = Arc::new(ControlFlags::default());
        let router = Arc::new(InputRouter::new(flags.clone()));
        let result = Arc::new(Mutex::new(None));
        let slot = result.clone();
        let pointer: Arc<dyn PointerSource> = Arc::new(|| None);
        let session = CaptureSession::start(
            CaptureSessionOptions {
                settings: FilterSettings::default(),
                queue_capacity: 64,
                initial_position: (0, 0),
                hook_timeout: Duration::from_millis(100),
            },
            pointer,
            None,
            Box::new(move |outcome| *slot.lock() = Some(outcome)),
        )
        .unwrap();
        router.attach(session.sink());
        flags.recording.store(true, Ordering::SeqCst);
        (router, session, result)
    }

    #[test]
    fn test_escape_is_never_recorded_and_stops_recording() {
        let (router, session, result) = recording_router();
        router.handle(&event(EventType::KeyPress(rdev::Key::KeyA)));
        router.handle(&event(EventType::KeyRelease(rdev::Key::KeyA)));
        router.handle(&event(EventType::KeyPress(rdev::Key::Escape)));
        router.handle(&event(EventType::KeyRelease(rdev::Key::Escape)));
        // Ignored: recording already stopped by the cancel key.
        router.handle(&event(EventType::KeyPress(rdev::Key::KeyB)));

        assert!(!router.flags().is_recording());
        assert!(session.finish(Duration::from_secs(2)));

        let events = result.lock().take().unwrap().events;
        let keys: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                InputEvent::Key { key, action, .. } => Some((key.clone(), *action)),
                _ => None,
            })
            .collect();
        assert_eq!(
            keys,
            vec![
                (Some(KeyPayload::char('a')), KeyAction::Press),
                (Some(KeyPayload::char('a')), KeyAction::Release),
            ]
        );
    }

    #[test]
    fn test_escape_cancels_replay() {
        let flags = Arc::new(ControlFlags::default());
        let router = InputRouter::new(flags.clone());
        flags.replaying.store(true, Ordering::SeqCst);
        assert_eq!(router.cancel(), CancelAction::CancelReplay);
        assert!(flags.is_cancelled());
    }

    #[test]
    fn test_escape_when_idle_is_ignored() {
        let flags = Arc::new(ControlFlags::default());
        let router = InputRouter::new(flags.clone());
        router.handle(&event(EventType::KeyPress(rdev::Key::Escape)));
        assert!(!flags.is_cancelled());
        assert_eq!(router.cancel(), CancelAction::Ignored);
    }

    #[test]
    fn test_clicks_use_last_pointer_and_coarse_wheel_is_bypassed() {
        let (router, session, result) = recording_router();
        std::thread::sleep(Duration::from_millis(5));
        router.handle(&event(EventType::MouseMove { x: 12.7, y: 30.2 }));
        router.handle(&event(EventType::ButtonPress(rdev::Button::Right)));
        router.handle(&event(EventType::Wheel { delta_x: 0, delta_y: 1 }));

        router.flags().high_res_scroll.store(true, Ordering::SeqCst);
        router.handle(&event(EventType::Wheel { delta_x: 0, delta_y: 1 }));
        router.submit_high_res_wheel(12.0, 30.0, 0.0, 0.25);

        assert_eq!(router.last_pointer(), Some((12, 30)));
        assert!(session.finish(Duration::from_secs(2)));

        let events = result.lock().take().unwrap().events;
        let scrolls: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                InputEvent::Scroll { dy, .. } => Some(*dy),
                _ => None,
            })
            .collect();
        assert_eq!(scrolls, vec![1.0, 0.25]);
        assert!(events.iter().any(|e| matches!(
            e,
            InputEvent::Click {
                x: 12,
                y: 30,
                button: MouseButton::Right,
                pressed: true,
                ..
            }
        )));
    }

    #[test]
    fn test_input_ignored_when_not_recording() {
        let flags = Arc::new(ControlFlags::default());
        let router = InputRouter::new(flags);
        router.handle(&event(EventType::MouseMove { x: 1.0, y: 2.0 }));
        router.handle(&event(EventType::KeyPress(rdev::Key::KeyA)));
        assert_eq!(router.last_pointer(), Some((1, 2)));
        assert_eq!(router.events_seen(), 2);
    }
}
