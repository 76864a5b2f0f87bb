//! Clock estimation for the display and audio paths.
//!
//! Both clocks are noisy: vsync intervals jitter with compositor load and the audio callback fires in bursts.
//! A [`RateMeter`] keeps a small window of Hz samples and only promotes its running median once the window is
//! both full and tight enough. After that first lock the reported value only moves when a *tighter* window shows up.

/// Largest window any meter may use.
pub const MAX_WINDOW: usize = 30;

pub const DISPLAY_WINDOW: usize = 30;
pub const DISPLAY_STABILITY_HZ: f64 = 1.0;

pub const AUDIO_WINDOW: usize = 10;
pub const AUDIO_STABILITY_HZ: f64 = 500.0;
/// Seconds between two audio rate samples.
pub const AUDIO_SAMPLE_INTERVAL_SECS: f64 = 2.0;

/// Samples above this are treated as garbage (a stalled timer reporting a near-zero interval).
const MAX_SANE_HZ: f64 = 1_000_000.0;
const MIN_SAMPLES: usize = 3;

#[derive(Debug, Clone)]
pub struct RateMeter {
    /// Ring of the most recent samples, only the first `count` entries are valid.
    samples: [f64; MAX_WINDOW],
    /// Next write position in `samples`.
    index: usize,
    /// Amount of valid samples, saturates at `window`.
    count: usize,
    window: usize,
    stability_threshold: f64,

    median: f64,
    min: f64,
    max: f64,

    /// The median at the moment of the tightest lock so far.
    locked_value: f64,
    /// The spread (`max - min`) belonging to `locked_value`.
    locked_spread: f64,
    stable: bool,
}

impl RateMeter {
    /// Create a meter with the given window (clamped to `1..=MAX_WINDOW`) and lock threshold in Hz.
    pub fn new(window: usize, stability_threshold: f64) -> Self {
        Self {
            samples: [0.0; MAX_WINDOW],
            index: 0,
            count: 0,
            window: window.clamp(1, MAX_WINDOW),
            stability_threshold,
            median: 0.0,
            min: 0.0,
            max: 0.0,
            locked_value: 0.0,
            locked_spread: 0.0,
            stable: false,
        }
    }

    /// A meter tuned for vsync intervals, sampled every presented frame.
    pub fn display() -> Self {
        Self::new(DISPLAY_WINDOW, DISPLAY_STABILITY_HZ)
    }

    /// A meter tuned for the audio device clock, sampled every [`AUDIO_SAMPLE_INTERVAL_SECS`].
    pub fn audio() -> Self {
        Self::new(AUDIO_WINDOW, AUDIO_STABILITY_HZ)
    }

    pub fn add_sample(&mut self, hz: f64) {
        if !hz.is_finite() || hz <= 0.0 || hz > MAX_SANE_HZ {
            return;
        }

        self.samples[self.index] = hz;
        self.index = (self.index + 1) % self.window;
        if self.count < self.window {
            self.count += 1;
        }

        if self.count < MIN_SAMPLES {
            return;
        }

        let mut sorted = [0.0f64; MAX_WINDOW];
        let sorted = &mut sorted[..self.count];
        sorted.copy_from_slice(&self.samples[..self.count]);
        sorted.sort_unstable_by(f64::total_cmp);

        self.min = sorted[0];
        self.max = sorted[self.count - 1];
        // Lower middle for even counts.
        self.median = sorted[self.count / 2];

        let spread = self.max - self.min;

        if self.count >= self.window && spread < self.stability_threshold && (!self.stable || spread < self.locked_spread)
        {
            if !self.stable {
                log::debug!("Rate meter locked at {:.3} Hz (spread {:.3})", self.median, spread);
            }
            self.stable = true;
            self.locked_value = self.median;
            self.locked_spread = spread;
        }
    }

    /// The locked rate, or `0.0` when the meter never stabilised.
    pub fn rate(&self) -> f64 {
        if self.stable && self.count >= MIN_SAMPLES {
            self.locked_value
        } else {
            0.0
        }
    }

    /// The current window's `max - min`, or `0.0` with fewer than three samples.
    pub fn swing(&self) -> f64 {
        if self.count < MIN_SAMPLES {
            0.0
        } else {
            self.max - self.min
        }
    }

    #[inline]
    pub fn is_stable(&self) -> bool {
        self.stable
    }

    #[inline]
    pub fn sample_count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn locked_spread(&self) -> f64 {
        self.locked_spread
    }

    #[inline]
    pub fn median(&self) -> f64 {
        self.median
    }

    /// Forget everything, used when the core reports new AV timings.
    pub fn reset(&mut self) {
        *self = Self::new(self.window, self.stability_threshold);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spread_samples(count: usize, low: f64, high: f64) -> Vec<f64> {
        (0..count)
            .map(|i| low + (high - low) * i as f64 / (count - 1) as f64)
            .collect()
    }

    #[test]
    fn test_needs_three_samples() {
        let mut meter = RateMeter::new(3, 1.0);
        meter.add_sample(60.0);
        meter.add_sample(60.0);

        assert_eq!(meter.rate(), 0.0);
        assert_eq!(meter.swing(), 0.0);

        meter.add_sample(60.0);
        assert!(meter.is_stable());
        assert_eq!(meter.rate(), 60.0);
    }

    #[test]
    fn test_ignores_garbage() {
        let mut meter = RateMeter::display();
        meter.add_sample(0.0);
        meter.add_sample(-5.0);
        meter.add_sample(f64::NAN);
        meter.add_sample(f64::INFINITY);

        assert_eq!(meter.sample_count(), 0);
    }

    #[test]
    fn test_locks_on_display_window() {
        let mut meter = RateMeter::display();
        for hz in spread_samples(30, 59.90, 60.02) {
            meter.add_sample(hz);
        }

        assert!(meter.is_stable());
        assert!((meter.rate() - 59.96).abs() < 0.01, "rate was {}", meter.rate());
        assert!((meter.swing() - 0.12).abs() < 1e-9);

        // A worse window must not replace the lock.
        let locked = meter.rate();
        meter.add_sample(59.82);
        assert!((meter.swing() - 0.20).abs() < 1e-6);
        assert_eq!(meter.rate(), locked);
    }

    #[test]
    fn test_noisy_signal_never_locks() {
        let mut meter = RateMeter::display();
        for i in 0..60 {
            meter.add_sample(if i % 2 == 0 { 55.0 } else { 65.0 });
        }

        assert!(!meter.is_stable());
        assert_eq!(meter.rate(), 0.0);
        assert!((meter.swing() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_locked_spread_never_increases() {
        let mut meter = RateMeter::new(5, 1.0);
        let signal = [60.0, 60.3, 59.8, 60.1, 59.9, 60.6, 59.7, 60.0, 60.05, 60.02, 60.01, 60.5, 59.6, 60.0];
        let mut last_spread = None;

        for hz in signal {
            meter.add_sample(hz);
            if meter.is_stable() {
                if let Some(last) = last_spread {
                    assert!(meter.locked_spread() <= last);
                }
                last_spread = Some(meter.locked_spread());
            }
        }

        assert!(last_spread.is_some());
    }

    #[test]
    fn test_reset() {
        let mut meter = RateMeter::new(3, 1.0);
        for _ in 0..3 {
            meter.add_sample(48000.0);
        }
        meter.reset();

        assert!(!meter.is_stable());
        assert_eq!(meter.sample_count(), 0);
    }
}
