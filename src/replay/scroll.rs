//! Fractional wheel accumulation.
//!
//! Recorded deltas may be fractional, injection is integral. Each axis keeps
//! a running remainder: deltas are added, the integer part (truncated toward
//! zero) is emitted, and the fraction carries to the next event. Whatever is
//! left at the end of a completed replay is rounded and flushed.

/// Per-axis remainder, measured in emission units.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollAccumulator {
    resolution: f64,
    x: f64,
    y: f64,
}

impl ScrollAccumulator {
    /// `resolution` is the number of emission units per recorded wheel unit.
    pub fn new(resolution: f64) -> Self {
        let resolution = if resolution.is_finite() && resolution > 0.0 { resolution } else { 1.0 };
        Self {
            resolution,
            x: 0.0,
            y: 0.0,
        }
    }

    /// Add one event's deltas; returns the integer steps to emit now.
    pub fn add(&mut self, dx: f64, dy: f64) -> (i32, i32) {
        if dx.is_finite() {
            self.x += dx * self.resolution;
        }
        if dy.is_finite() {
            self.y += dy * self.resolution;
        }

        let step_x = self.x.trunc() as i32;
        let step_y = self.y.trunc() as i32;
        self.x -= step_x as f64;
        self.y -= step_y as f64;
        (step_x, step_y)
    }

    /// Put back steps that `add` handed out but could not be delivered.
    pub fn restore(&mut self, step_x: i32, step_y: i32) {
        self.x += step_x as f64;
        self.y += step_y as f64;
    }

    /// Round and drain whatever remains.
    pub fn flush(&mut self) -> (i32, i32) {
        let step_x = self.x.round() as i32;
        let step_y = self.y.round() as i32;
        self.x = 0.0;
        self.y = 0.0;
        (step_x, step_y)
    }

    pub fn remainder(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl Default for ScrollAccumulator {
    fn default() -> Self {
        Self::new(1.0)
    }
}
