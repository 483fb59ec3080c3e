//! Capture session: producers, queue and the single writer.
//!
//! Input callbacks never touch the timeline. They push `RawInput` into a
//! bounded queue with `try_send` and return. One worker thread drains the
//! queue through `CaptureFilters`, and when asked to finish it appends the
//! closing boundary move, tears down the wheel hook and hands the frozen
//! timeline to its completion callback.

use crate::capture::input::filters::{CaptureFilters, FilterSettings};
use crate::capture::input::types::{InputEvent, KeyAction, KeyPayload, MouseButton};
use crate::capture::WheelHook;
use crate::recorder::error::{RecordingError, RecordingResult};
use crate::utils::{join_with_timeout, spawn_named};
use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub enum RawInputKind {
    Move { x: f64, y: f64 },
    Button { x: f64, y: f64, button: MouseButton, pressed: bool },
    Wheel { x: f64, y: f64, dx: f64, dy: f64 },
    Key { action: KeyAction, key: KeyPayload },
}

/// One callback's worth of input, stamped with recording-relative time.
#[derive(Debug, Clone, PartialEq)]
pub struct RawInput {
    pub time: f64,
    pub kind: RawInputKind,
}

/// Producer handle given to listener and hook callbacks.
#[derive(Debug, Clone)]
pub struct CaptureSink {
    input_tx: Sender<RawInput>,
    finish_tx: Sender<()>,
    start: Instant,
    dropped: Arc<AtomicU64>,
}

impl CaptureSink {
    /// Seconds since the recording started.
    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Queue input without blocking. Returns `false` if it was dropped.
    pub fn submit(&self, kind: RawInputKind) -> bool {
        let raw = RawInput {
            time: self.elapsed(),
            kind,
        };
        match self.input_tx.try_send(raw) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Ask the worker to close the timeline. Safe to call repeatedly.
    pub fn request_finish(&self) {
        let _ = self.finish_tx.try_send(());
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Queries the worker needs when closing the timeline.
pub trait PointerSource: Send + Sync {
    fn pointer_position(&self) -> Option<(i32, i32)>;
}

impl<F> PointerSource for F
where
    F: Fn() -> Option<(i32, i32)> + Send + Sync,
{
    fn pointer_position(&self) -> Option<(i32, i32)> {
        self()
    }
}

/// Frozen result of one capture session.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOutcome {
    pub events: Vec<InputEvent>,
    pub dropped: u64,
}

pub type FinishCallback = Box<dyn FnOnce(CaptureOutcome) + Send + 'static>;

pub struct CaptureSessionOptions {
    pub settings: FilterSettings,
    pub queue_capacity: usize,
    pub initial_position: (i32, i32),
    pub hook_timeout: Duration,
}

/// A running capture worker.
pub struct CaptureSession {
    sink: CaptureSink,
    worker: Option<JoinHandle<()>>,
}

impl CaptureSession {
    /// Start the worker. The opening boundary move is appended before any
    /// queued input is processed.
    pub fn start(
        options: CaptureSessionOptions,
        pointer: Arc<dyn PointerSource>,
        wheel_hook: Option<WheelHook>,
        on_finish: FinishCallback,
    ) -> RecordingResult<Self> {
        let (input_tx, input_rx) = bounded(options.queue_capacity.max(1));
        let (finish_tx, finish_rx) = bounded(1);

        let sink = CaptureSink {
            input_tx,
            finish_tx,
            start: Instant::now(),
            dropped: Arc::new(AtomicU64::new(0)),
        };

        let mut filters = CaptureFilters::new(options.settings);
        let (x, y) = options.initial_position;
        filters.push_move(x as f64, y as f64, 0.0, true);

        let worker_sink = sink.clone();
        let hook_timeout = options.hook_timeout;
        let worker = spawn_named("input-capture", move || {
            run_capture_worker(
                filters,
                input_rx,
                finish_rx,
                worker_sink,
                pointer,
                wheel_hook,
                hook_timeout,
                on_finish,
            );
        })
        .map_err(|e| RecordingError::PlatformError(format!("Failed to spawn capture worker: {}", e)))?;

        Ok(Self {
            sink,
            worker: Some(worker),
        })
    }

    pub fn sink(&self) -> CaptureSink {
        self.sink.clone()
    }

    /// Request finish and wait (bounded) for the worker to exit.
    pub fn finish(mut self, timeout: Duration) -> bool {
        self.sink.request_finish();
        match self.worker.take() {
            Some(worker) => join_with_timeout(worker, timeout),
            None => true,
        }
    }
}

fn apply_raw(filters: &mut CaptureFilters, raw: RawInput) {
    match raw.kind {
        RawInputKind::Move { x, y } => {
            filters.push_move(x, y, raw.time, false);
        }
        RawInputKind::Button {
            x,
            y,
            button,
            pressed,
        } => filters.push_click(x, y, button, pressed, raw.time),
        RawInputKind::Wheel { x, y, dx, dy } => {
            filters.push_scroll(x, y, dx, dy, raw.time);
        }
        RawInputKind::Key { action, key } => filters.push_key(action, key, raw.time),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_capture_worker(
    mut filters: CaptureFilters,
    input_rx: Receiver<RawInput>,
    finish_rx: Receiver<()>,
    sink: CaptureSink,
    pointer: Arc<dyn PointerSource>,
    wheel_hook: Option<WheelHook>,
    hook_timeout: Duration,
    on_finish: FinishCallback,
) {
    tracing::debug!("Capture worker started");

    loop {
        select! {
            recv(input_rx) -> msg => match msg {
                Ok(raw) => apply_raw(&mut filters, raw),
                Err(_) => break,
            },
            recv(finish_rx) -> _ => break,
        }
    }

    // Input queued before the stop request still belongs to the recording.
    for raw in input_rx.try_iter() {
        apply_raw(&mut filters, raw);
    }

    if let Some(hook) = wheel_hook {
        hook.stop(hook_timeout);
    }

    let end = pointer.pointer_position().or_else(|| {
        filters
            .events()
            .iter()
            .rev()
            .find_map(InputEvent::position)
    });
    if let Some((x, y)) = end {
        filters.push_move(x as f64, y as f64, sink.elapsed(), true);
    }

    let outcome = CaptureOutcome {
        events: filters.into_events(),
        dropped: sink.dropped(),
    };
    if outcome.dropped > 0 {
        tracing::warn!("Capture queue overflowed, {} inputs dropped", outcome.dropped);
    }
    tracing::info!("Capture worker finished with {} events", outcome.events.len());

    on_finish(outcome);
}
