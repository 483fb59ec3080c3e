//! Admission policy applied to raw input before it reaches the timeline.
//!
//! Moves are throttled and de-duplicated by integer position. Scrolls are
//! de-duplicated by a rounded signature so that two sources reporting the
//! same wheel tick only produce one event. Clicks and keys always pass.

use crate::capture::input::types::{InputEvent, KeyAction, KeyPayload, MouseButton};
use crate::config::RecorderConfig;

/// Thresholds for the capture filters, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSettings {
    pub min_move_interval: f64,
    pub scroll_dedupe_window: f64,
    pub scroll_signature_decimals: u32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            min_move_interval: 0.003,
            scroll_dedupe_window: 0.004,
            scroll_signature_decimals: 3,
        }
    }
}

impl From<&RecorderConfig> for FilterSettings {
    fn from(config: &RecorderConfig) -> Self {
        Self {
            min_move_interval: config.min_move_interval_ms as f64 / 1000.0,
            scroll_dedupe_window: config.scroll_dedupe_window_ms as f64 / 1000.0,
            scroll_signature_decimals: config.scroll_signature_decimals,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScrollSignature {
    x: i32,
    y: i32,
    dx: i64,
    dy: i64,
}

/// Stateful filters plus the timeline they append to.
///
/// Owned by exactly one writer for the duration of a recording.
#[derive(Debug)]
pub struct CaptureFilters {
    settings: FilterSettings,
    events: Vec<InputEvent>,
    last_time: f64,
    last_move_time: f64,
    last_move_pos: Option<(i32, i32)>,
    last_scroll_time: Option<f64>,
    last_scroll_signature: Option<ScrollSignature>,
}

impl CaptureFilters {
    pub fn new(settings: FilterSettings) -> Self {
        Self {
            settings,
            events: Vec::new(),
            last_time: 0.0,
            last_move_time: 0.0,
            last_move_pos: None,
            last_scroll_time: None,
            last_scroll_signature: None,
        }
    }

    /// Timestamps from different producer threads can interleave slightly;
    /// clamp so the timeline never runs backwards.
    fn monotonic(&mut self, time: f64) -> f64 {
        let time = if time.is_finite() { time.max(self.last_time) } else { self.last_time };
        self.last_time = time;
        time
    }

    /// Returns `true` if the move was appended.
    pub fn push_move(&mut self, x: f64, y: f64, time: f64, force: bool) -> bool {
        if !force && (time - self.last_move_time) < self.settings.min_move_interval {
            return false;
        }

        let pos = (x as i32, y as i32);
        if !force && self.last_move_pos == Some(pos) {
            return false;
        }

        let time = self.monotonic(time);
        self.last_move_time = time;
        self.last_move_pos = Some(pos);
        self.events.push(InputEvent::Move {
            time,
            x: pos.0,
            y: pos.1,
        });
        true
    }

    pub fn push_click(&mut self, x: f64, y: f64, button: MouseButton, pressed: bool, time: f64) {
        let time = self.monotonic(time);
        self.events.push(InputEvent::Click {
            time,
            x: x as i32,
            y: y as i32,
            button,
            pressed,
        });
    }

    /// Returns `true` if the scroll was appended.
    pub fn push_scroll(&mut self, x: f64, y: f64, dx: f64, dy: f64, time: f64) -> bool {
        let scale = 10f64.powi(self.settings.scroll_signature_decimals as i32);
        let signature = ScrollSignature {
            x: x as i32,
            y: y as i32,
            dx: (dx * scale).round() as i64,
            dy: (dy * scale).round() as i64,
        };

        if let (Some(last_sig), Some(last_time)) = (self.last_scroll_signature, self.last_scroll_time) {
            if last_sig == signature && (time - last_time) < self.settings.scroll_dedupe_window {
                return false;
            }
        }

        let time = self.monotonic(time);
        self.last_scroll_signature = Some(signature);
        self.last_scroll_time = Some(time);
        self.events.push(InputEvent::Scroll {
            time,
            x: signature.x,
            y: signature.y,
            dx,
            dy,
        });
        true
    }

    pub fn push_key(&mut self, action: KeyAction, key: KeyPayload, time: f64) {
        let time = self.monotonic(time);
        self.events.push(InputEvent::Key {
            time,
            action,
            key: Some(key),
        });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    /// Freeze the timeline.
    pub fn into_events(self) -> Vec<InputEvent> {
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters() -> CaptureFilters {
        CaptureFilters::new(FilterSettings::default())
    }

    #[test]
    fn test_forced_move_always_appended() {
        let mut f = filters();
        assert!(f.push_move(10.0, 10.0, 0.0, true));
        assert!(f.push_move(10.0, 10.0, 0.0, true));
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn test_move_throttle() {
        let mut f = filters();
        f.push_move(0.0, 0.0, 0.0, true);
        assert!(!f.push_move(5.0, 5.0, 0.001, false));
        assert!(f.push_move(5.0, 5.0, 0.004, false));
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn test_move_dedupe_by_integer_position() {
        let mut f = filters();
        f.push_move(5.2, 5.9, 0.0, true);
        assert!(!f.push_move(5.7, 5.1, 0.010, false));
        assert!(f.push_move(6.0, 5.0, 0.020, false));
    }

    #[test]
    fn test_admitted_moves_are_monotonic_and_distinct() {
        let mut f = filters();
        f.push_move(0.0, 0.0, 0.0, true);
        let mut t = 0.0;
        for i in 0..500 {
            t += 0.0007 * ((i % 7) as f64);
            let x = (i / 3) as f64;
            f.push_move(x, x * 0.5, t, false);
        }
        f.push_move(1000.0, 1000.0, t + 0.001, true);

        let moves: Vec<_> = f
            .events()
            .iter()
            .filter_map(|e| match e {
                InputEvent::Move { time, x, y } => Some((*time, *x, *y)),
                _ => None,
            })
            .collect();

        for pair in moves.windows(2) {
            assert!(pair[1].0 >= pair[0].0, "time went backwards: {:?}", pair);
        }
        // Interior moves never repeat a position.
        for pair in moves[..moves.len() - 1].windows(2) {
            assert!((pair[0].1, pair[0].2) != (pair[1].1, pair[1].2));
        }
    }

    #[test]
    fn test_scroll_dedupe_suppresses_duplicate_tick() {
        let mut f = filters();
        assert!(f.push_scroll(100.0, 100.0, 0.0, 1.0, 0.100));
        assert!(!f.push_scroll(100.0, 100.0, 0.0, 1.0, 0.101));
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn test_scroll_dedupe_allows_repeat_after_window() {
        let mut f = filters();
        assert!(f.push_scroll(100.0, 100.0, 0.0, 1.0, 0.100));
        assert!(f.push_scroll(100.0, 100.0, 0.0, 1.0, 0.110));
    }

    #[test]
    fn test_scroll_dedupe_allows_different_delta() {
        let mut f = filters();
        assert!(f.push_scroll(100.0, 100.0, 0.0, 0.25, 0.100));
        assert!(f.push_scroll(100.0, 100.0, 0.0, 0.5, 0.1001));
        // Differences below the signature precision are treated as equal.
        assert!(!f.push_scroll(100.0, 100.0, 0.0, 0.50001, 0.1002));
    }

    #[test]
    fn test_time_clamped_to_non_decreasing() {
        let mut f = filters();
        f.push_click(0.0, 0.0, MouseButton::Left, true, 0.5);
        f.push_key(KeyAction::Press, KeyPayload::char('a'), 0.4);
        assert_eq!(f.events()[1].time(), 0.5);
    }
}
