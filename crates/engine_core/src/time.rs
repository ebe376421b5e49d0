// crates/engine_core/src/time.rs

use std::any::Any;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::subsystem::{LiveSubsystems, Subsystem};

/// Frame deltas above this are clamped (debugger pauses, window drags, ...).
const MAX_FRAME_DELTA: f32 = 0.25;

/// Master clock, advanced once per simulation frame.
pub struct Time {
    started: Instant,
    last_frame: Instant,
    frame_delta: f32,
    frame_index: u64,
}

impl Time {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_frame: now,
            frame_delta: 0.0,
            frame_index: 0,
        }
    }

    pub fn update(&mut self) {
        let now = Instant::now();
        self.advance(now.duration_since(self.last_frame));
        self.last_frame = now;
    }

    fn advance(&mut self, elapsed: Duration) {
        self.frame_delta = elapsed.as_secs_f32().min(MAX_FRAME_DELTA);
        self.frame_index += 1;
    }

    /// Seconds between the last two `update` calls.
    pub fn frame_delta(&self) -> f32 {
        self.frame_delta
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

impl Subsystem for Time {
    fn name(&self) -> &'static str {
        "Time"
    }

    fn start(&mut self, _live: &LiveSubsystems<'_>) -> Result<()> {
        *self = Self::new();
        Ok(())
    }

    fn stop(&mut self) {}

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_frames_are_clamped() {
        let mut time = Time::new();
        time.advance(Duration::from_secs(3));
        assert_eq!(time.frame_delta(), MAX_FRAME_DELTA);
        assert_eq!(time.frame_index(), 1);
    }

    #[test]
    fn short_frames_pass_through() {
        let mut time = Time::new();
        time.advance(Duration::from_millis(20));
        assert!((time.frame_delta() - 0.02).abs() < 1e-6);
        assert_eq!(time.frame_index(), 1);
    }

    #[test]
    fn starting_resets_the_clock() {
        let mut registry = crate::subsystem::SubsystemRegistry::new().with(Time::new());
        registry.start_all().unwrap();
        let time = registry.get_mut::<Time>().unwrap();
        time.advance(Duration::from_millis(5));
        registry.stop_all();
        registry.start_all().unwrap();
        assert_eq!(registry.get::<Time>().unwrap().frame_index(), 0);
    }

    #[test]
    fn update_moves_the_frame_counter() {
        let mut time = Time::new();
        time.update();
        time.update();
        assert_eq!(time.frame_index(), 2);
        assert!(time.frame_delta() <= MAX_FRAME_DELTA);
    }
}
