//! Frame timing.

use std::time::{Duration, Instant};

/// Timings of the most recent frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTimings {
    /// Index of the frame (starts at 0, counts presented and aborted frames).
    pub frame_index: u64,
    /// Clamped delta since the previous frame, in seconds.
    pub delta_seconds: f64,
    /// Seconds since the renderer was created.
    pub total_seconds: f64,
    /// Wall time spent inside `render_frame`.
    pub frame_cpu_time: Duration,
}

impl Default for RenderTimings {
    fn default() -> Self {
        Self {
            frame_index: 0,
            delta_seconds: 0.0,
            total_seconds: 0.0,
            frame_cpu_time: Duration::ZERO,
        }
    }
}

/// Measures frame deltas, clamped to a maximum.
#[derive(Debug)]
pub struct FrameTimer {
    start: Instant,
    last_tick: Option<Instant>,
    max_delta: f64,
    delta: f64,
}

impl FrameTimer {
    /// Create a timer whose deltas never exceed `max_delta` seconds.
    pub fn new(max_delta: f64) -> Self {
        Self {
            start: Instant::now(),
            last_tick: None,
            max_delta,
            delta: 0.0,
        }
    }

    /// Advance to `now` and return the clamped delta.
    pub fn tick_at(&mut self, now: Instant) -> f64 {
        let raw = self
            .last_tick
            .map_or(0.0, |last| now.saturating_duration_since(last).as_secs_f64());
        self.last_tick = Some(now);
        self.delta = raw.min(self.max_delta);
        self.delta
    }

    /// Advance to the current time.
    pub fn tick(&mut self) -> f64 {
        self.tick_at(Instant::now())
    }

    /// Delta of the last tick.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Seconds since creation.
    pub fn total(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tick_is_zero() {
        let mut timer = FrameTimer::new(1.0 / 15.0);
        assert_eq!(timer.tick(), 0.0);
    }

    #[test]
    fn test_delta_clamped() {
        let mut timer = FrameTimer::new(1.0 / 15.0);
        let now = Instant::now();
        timer.tick_at(now);
        let delta = timer.tick_at(now + Duration::from_secs(2));
        assert!((delta - 1.0 / 15.0).abs() < 1e-9);

        let delta = timer.tick_at(now + Duration::from_secs(2) + Duration::from_millis(10));
        assert!((delta - 0.010).abs() < 1e-6);
    }
}
