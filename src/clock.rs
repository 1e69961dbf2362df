//! Frame clock: tracks elapsed time and a monotonic frame counter, and emits an FPS
//! sample notification every second. Simpler than the teacher's `Timer`, which
//! additionally decouples a fixed-step simulation clock from render time — this
//! pipeline has no such decoupling, since the spec's driver advances exactly once
//! per frame and never drops or replays simulation steps.
use std::time::{Duration, Instant};

pub struct FrameClock {
    timestamp_startup: Instant,
    timestamp_last_frame: Instant,
    time_since_startup: Duration,
    last_frame_duration: Duration,
    frame_counter: u64,

    fps_window_start: Instant,
    fps_window_frames: u32,
}

/// Emitted by `FrameClock::on_frame_submitted` roughly once a second.
pub struct FpsSample {
    pub frames_per_second: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        FrameClock {
            timestamp_startup: now,
            timestamp_last_frame: now,
            time_since_startup: Duration::from_secs(0),
            last_frame_duration: Duration::from_millis(16),
            frame_counter: 0,
            fps_window_start: now,
            fps_window_frames: 0,
        }
    }

    /// Advances the clock by one frame and returns an FPS sample if a full
    /// measurement window has elapsed.
    pub fn on_frame_submitted(&mut self) -> Option<FpsSample> {
        self.time_since_startup = self.timestamp_startup.elapsed();
        self.last_frame_duration = self.timestamp_last_frame.elapsed();
        self.timestamp_last_frame = Instant::now();
        self.frame_counter += 1;
        self.fps_window_frames += 1;

        let window_elapsed = self.fps_window_start.elapsed();
        if window_elapsed >= Duration::from_secs(1) {
            let sample = FpsSample {
                frames_per_second: self.fps_window_frames as f32 / window_elapsed.as_secs_f32(),
            };
            self.fps_window_start = Instant::now();
            self.fps_window_frames = 0;
            Some(sample)
        } else {
            None
        }
    }

    pub fn time_since_start(&self) -> Duration {
        self.time_since_startup
    }

    pub fn frame_delta(&self) -> Duration {
        self.last_frame_duration
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_counter_increments_monotonically() {
        let mut clock = FrameClock::new();
        for expected in 1..=10u64 {
            clock.on_frame_submitted();
            assert_eq!(clock.frame_counter(), expected);
        }
    }

    #[test]
    fn fps_sample_is_none_before_a_full_window() {
        let mut clock = FrameClock::new();
        assert!(clock.on_frame_submitted().is_none());
    }
}
