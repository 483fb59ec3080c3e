//! Time-ordered playback of a recorded timeline.
//!
//! One pass over a sorted copy of the events. Before each event the cancel
//! flag is checked, then the loop sleeps in short slices until the event's
//! offset from replay start is reached. A cancelled run skips the residual
//! scroll flush and the final pointer snap; every run ends by releasing
//! whatever keys and buttons are still held.

use crate::capture::input::types::{InputEvent, KeyAction};
use crate::replay::emitter::InputEmitter;
use crate::replay::held::{HeldInputs, ReleaseSummary};
use crate::replay::scroll::ScrollAccumulator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct ReplayOptions {
    /// Longest single sleep between cancel checks
    pub poll_slice: Duration,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            poll_slice: Duration::from_millis(2),
        }
    }
}

/// Summary handed back to the control surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayReport {
    pub events_applied: usize,
    pub scroll_events: usize,
    pub key_events: usize,
    pub skipped_events: usize,
    pub stopped_early: bool,
    pub released: ReleaseSummary,
    pub elapsed: Duration,
}

impl ReplayReport {
    pub fn status_line(&self) -> String {
        let verb = if self.stopped_early { "stopped" } else { "finished" };
        format!(
            "Replay {} ({} scroll, {} key events)",
            verb, self.scroll_events, self.key_events
        )
    }
}

/// Sorted copy of a timeline; ties keep their recorded order.
pub fn sorted_timeline(events: &[InputEvent]) -> Vec<InputEvent> {
    let mut sorted = events.to_vec();
    sorted.sort_by(|a, b| a.time().total_cmp(&b.time()));
    sorted
}

fn event_offset(time: f64) -> Duration {
    if time.is_nan() || time <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(time).unwrap_or(Duration::MAX)
}

/// Sleep until `target` has elapsed since `start`. Returns `false` if the
/// cancel flag was raised first.
fn wait_until(start: Instant, target: Duration, cancel: &AtomicBool, slice: Duration) -> bool {
    loop {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        let elapsed = start.elapsed();
        if elapsed >= target {
            return true;
        }
        std::thread::sleep((target - elapsed).min(slice));
    }
}

pub struct ReplayScheduler<'a> {
    emitter: &'a mut dyn InputEmitter,
    cancel: &'a AtomicBool,
    options: ReplayOptions,
    scroll: ScrollAccumulator,
    held: HeldInputs,
    report: ReplayReport,
}

impl<'a> ReplayScheduler<'a> {
    pub fn new(emitter: &'a mut dyn InputEmitter, cancel: &'a AtomicBool, options: ReplayOptions) -> Self {
        let scroll = ScrollAccumulator::new(emitter.scroll_resolution());
        Self {
            emitter,
            cancel,
            options,
            scroll,
            held: HeldInputs::new(),
            report: ReplayReport::default(),
        }
    }

    /// Play `events` to completion or until cancelled.
    pub fn run(mut self, events: &[InputEvent]) -> ReplayReport {
        let timeline = sorted_timeline(events);
        let start = Instant::now();
        let slice = self.options.poll_slice.max(Duration::from_micros(100));

        tracing::info!("Replaying {} events", timeline.len());

        for event in &timeline {
            if self.cancel.load(Ordering::Relaxed) {
                self.report.stopped_early = true;
                break;
            }
            if !wait_until(start, event_offset(event.time()), self.cancel, slice) {
                self.report.stopped_early = true;
                break;
            }
            self.apply(event);
        }

        if !self.report.stopped_early {
            self.finish(&timeline);
        } else {
            tracing::info!(
                "Replay cancelled after {} of {} events",
                self.report.events_applied + self.report.skipped_events,
                timeline.len()
            );
        }

        self.report.released = self.held.release_all(self.emitter);
        self.report.elapsed = start.elapsed();
        self.report
    }

    fn apply(&mut self, event: &InputEvent) {
        let result = match event {
            InputEvent::Move { x, y, .. } => self.emitter.move_to(*x, *y),
            InputEvent::Click {
                x, y, button, pressed, ..
            } => self.emitter.move_to(*x, *y).and_then(|_| {
                self.emitter.button(*button, *pressed)?;
                if *pressed {
                    self.held.press_button(*button);
                } else {
                    self.held.release_button(*button);
                }
                Ok(())
            }),
            InputEvent::Scroll { x, y, dx, dy, .. } => {
                self.report.scroll_events += 1;
                let (step_x, step_y) = self.scroll.add(*dx, *dy);
                let result = self.emitter.move_to(*x, *y).and_then(|_| {
                    if step_x != 0 || step_y != 0 {
                        self.emitter.scroll(step_x, step_y)?;
                    }
                    Ok(())
                });
                if result.is_err() {
                    // Undelivered steps stay pending for the next scroll or the final flush.
                    self.scroll.restore(step_x, step_y);
                }
                result
            }
            InputEvent::Key { action, key, .. } => {
                let Some(key) = key else {
                    tracing::debug!("Skipping key event without a usable key");
                    self.report.skipped_events += 1;
                    return;
                };
                let pressed = *action == KeyAction::Press;
                match self.emitter.key(key, pressed) {
                    Ok(()) => {
                        self.report.key_events += 1;
                        if pressed {
                            self.held.press_key(key.clone());
                        } else {
                            self.held.release_key(key);
                        }
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
        };

        match result {
            Ok(()) => self.report.events_applied += 1,
            Err(e) => {
                self.report.skipped_events += 1;
                tracing::warn!("Skipping {} event at {:.3}s: {}", event.kind(), event.time(), e);
            }
        }
    }

    fn finish(&mut self, timeline: &[InputEvent]) {
        let (step_x, step_y) = self.scroll.flush();
        if step_x != 0 || step_y != 0 {
            if let Err(e) = self.emitter.scroll(step_x, step_y) {
                tracing::warn!("Residual scroll flush failed: {}", e);
            }
        }

        if let Some((x, y)) = timeline.iter().rev().find_map(InputEvent::position) {
            if let Err(e) = self.emitter.move_to(x, y) {
                tracing::warn!("Final pointer snap failed: {}", e);
            }
        }
    }
}

/// Convenience wrapper around `ReplayScheduler`.
pub fn replay_events(
    events: &[InputEvent],
    emitter: &mut dyn InputEmitter,
    cancel: &AtomicBool,
    options: ReplayOptions,
) -> ReplayReport {
    ReplayScheduler::new(emitter, cancel, options).run(events)
}
