use std::time::{Duration, Instant};

const WINDOW: usize = 120;

/// Simple moving average of the interval between presented frames.
pub struct FrameRate {
    /// The current sum of frame lengths
    frame_sum: Duration,
    /// The saved frame lengths used for the moving average
    frame_lengths: [Duration; WINDOW],
    index: usize,
    /// Amount of valid entries, until the window is filled once.
    filled: usize,
    last_time: Instant,
}

impl FrameRate {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    fn starting_at(now: Instant) -> Self {
        Self {
            frame_sum: Duration::ZERO,
            frame_lengths: [Duration::ZERO; WINDOW],
            index: 0,
            filled: 0,
            last_time: now,
        }
    }

    pub fn frame_finished(&mut self) {
        self.frame_finished_at(Instant::now());
    }

    fn frame_finished_at(&mut self, now: Instant) {
        let delta = now.saturating_duration_since(self.last_time);
        self.frame_sum -= self.frame_lengths[self.index];
        self.frame_sum += delta;
        self.frame_lengths[self.index] = delta;
        self.index = (self.index + 1) % WINDOW;
        self.filled = (self.filled + 1).min(WINDOW);

        self.last_time = now;
    }

    /// Frames per second over the window, `0.0` before the first frame.
    pub fn fps(&self) -> f32 {
        if self.filled == 0 || self.frame_sum.is_zero() {
            return 0.0;
        }

        1.0 / (self.frame_sum.as_secs_f32() / self.filled as f32)
    }
}
