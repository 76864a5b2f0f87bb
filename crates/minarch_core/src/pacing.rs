//! Frame pacing: deciding when to run the core, how long to sleep and how far to stretch audio.

use std::time::{Duration, Instant};

/// Rates closer than this (relative) are treated as identical.
pub const PACER_TOLERANCE: f64 = 0.01;
/// Maximum audio resampling correction in either direction.
pub const MAX_RESYNC_DEVIATION: f64 = 0.012;
/// SRAM must be unchanged this long before it is flushed to disk.
pub const SRAM_FLUSH_SECS: u64 = 5;

const Q16_SCALE: f64 = 65536.0;

/// Bresenham style pacer that spreads `game_fps` core frames over `display_hz` vsyncs.
///
/// Works in Q16.16 fixed point so long sessions do not drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePacer {
    game_fps_q16: i64,
    display_hz_q16: i64,
    accumulator: i64,
    direct: bool,
}

impl FramePacer {
    pub fn new(game_fps: f64, display_hz: f64) -> Self {
        let display_hz_q16 = (display_hz * Q16_SCALE) as i64;
        let direct = display_hz > 0.0 && ((game_fps - display_hz).abs() / display_hz) < PACER_TOLERANCE;

        Self {
            game_fps_q16: (game_fps * Q16_SCALE) as i64,
            display_hz_q16,
            // The first vsync always runs a frame.
            accumulator: display_hz_q16,
            direct,
        }
    }

    /// Whether the core should run for this vsync. A `false` means the previous frame is shown again.
    pub fn step(&mut self) -> bool {
        if self.direct {
            return true;
        }

        let run = self.accumulator >= self.display_hz_q16;
        if run {
            self.accumulator -= self.display_hz_q16;
        }
        self.accumulator += self.game_fps_q16;
        run
    }

    pub fn reset(&mut self) {
        self.accumulator = self.display_hz_q16;
    }

    pub fn is_direct(&self) -> bool {
        self.direct
    }
}

/// Keeps fast-forward from running flat out.
#[derive(Debug, Clone, Default)]
pub struct FastForwardLimiter {
    frame_time_us: u64,
    configured_for: Option<(u32, u64)>,
    last_time: Option<u64>,
}

impl FastForwardLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// How long to sleep after a frame finishing at `now_us`.
    ///
    /// Only ever returns sub-frame delays (`1..17` ms), and nothing when fast-forward is off or unlimited.
    pub fn delay(&mut self, now_us: u64, fps: f64, fast_forward: bool, max_ff: u32) -> Option<Duration> {
        let key = (max_ff, fps.to_bits());
        if self.configured_for != Some(key) {
            self.configured_for = Some(key);
            let target = fps * (max_ff + 1) as f64;
            self.frame_time_us = if target > 0.0 { (1_000_000.0 / target) as u64 } else { 0 };
        }

        if !fast_forward || max_ff == 0 {
            self.last_time = Some(now_us);
            return None;
        }

        let last = *self.last_time.get_or_insert(now_us);
        let elapsed = now_us.wrapping_sub(last);

        if elapsed > 0 && elapsed < 0x80000 {
            self.last_time = Some(last + self.frame_time_us);
            if elapsed < self.frame_time_us {
                let delay = (self.frame_time_us - elapsed) / 1000;
                if delay > 0 && delay < 17 {
                    return Some(Duration::from_millis(delay));
                }
            }
            return None;
        }

        self.last_time = Some(now_us);
        None
    }
}

/// The factor by which audio should be resampled so it keeps pace with the display.
///
/// `display_hz` and `core_fps` are the locked rates, `0.0` while a meter is still settling. Falls back to `1.0`
/// then, and while fast-forwarding.
pub fn resync_ratio(display_hz: f64, core_fps: f64, fast_forward: bool) -> f64 {
    if fast_forward || display_hz <= 0.0 || core_fps <= 0.0 {
        return 1.0;
    }

    (display_hz / core_fps).clamp(1.0 - MAX_RESYNC_DEVIATION, 1.0 + MAX_RESYNC_DEVIATION)
}

/// Outcome of the end of frame budget check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBudget {
    /// Time left over, sleep it off.
    Sleep(Duration),
    /// Over budget, skip the next present.
    Late,
}

pub fn frame_budget(target_fps: f64, elapsed: Duration) -> FrameBudget {
    if target_fps <= 0.0 {
        return FrameBudget::Sleep(Duration::ZERO);
    }

    let budget = Duration::from_secs_f64(1.0 / target_fps);
    match budget.checked_sub(elapsed) {
        Some(remaining) if !remaining.is_zero() => FrameBudget::Sleep(remaining),
        _ => FrameBudget::Late,
    }
}

/// Counts presented frames over one second windows.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window_start: Instant,
    frames: u32,
    fps: f64,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
            fps: 0.0,
        }
    }

    /// Count one frame. Returns the new rate whenever a window closes.
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);

        if elapsed >= Duration::from_secs(1) {
            self.fps = self.frames as f64 / elapsed.as_secs_f64();
            self.frames = 0;
            self.window_start = now;
            Some(self.fps)
        } else {
            None
        }
    }

    /// Rate measured over the last closed window.
    pub fn fps(&self) -> f64 {
        self.fps
    }
}

/// Decides when battery backed memory should be written out.
///
/// Writes are coalesced: after the contents change, they must hold still for [`SRAM_FLUSH_SECS`] first.
#[derive(Debug, Clone)]
pub struct SramAutosave {
    written: u64,
    current: u64,
    changed_at: Option<Instant>,
}

impl SramAutosave {
    /// Start tracking, with `checksum` matching what is on disk.
    pub fn new(checksum: u64) -> Self {
        Self {
            written: checksum,
            current: checksum,
            changed_at: None,
        }
    }

    /// Feed the latest checksum. Returns `true` when a write is due, the caller is expected to perform it.
    pub fn update(&mut self, checksum: u64, now: Instant) -> bool {
        if checksum != self.current {
            self.current = checksum;
            self.changed_at = Some(now);
        }

        match self.changed_at {
            Some(changed) if now.saturating_duration_since(changed) >= Duration::from_secs(SRAM_FLUSH_SECS) => {
                self.changed_at = None;
                if self.current != self.written {
                    self.written = self.current;
                    return true;
                }
                false
            }
            _ => false,
        }
    }

    /// Record an out of band write (e.g. on shutdown).
    pub fn mark_written(&mut self, checksum: u64) {
        self.written = checksum;
        self.current = checksum;
        self.changed_at = None;
    }

    pub fn is_dirty(&self) -> bool {
        self.current != self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pacer_direct_mode() {
        let mut pacer = FramePacer::new(59.94, 60.0);

        assert!(pacer.is_direct());
        assert!((0..100).all(|_| pacer.step()));
    }

    #[test]
    fn test_pacer_spreads_frames() {
        // 50 fps content on a 60 Hz display runs 5 of every 6 vsyncs.
        let mut pacer = FramePacer::new(50.0, 60.0);
        assert!(!pacer.is_direct());

        let runs = (0..600).filter(|_| pacer.step()).count();
        assert_eq!(runs, 500);
    }

    #[test]
    fn test_pacer_first_step_runs_and_reset() {
        let mut pacer = FramePacer::new(30.0, 60.0);

        assert!(pacer.step());
        assert!(!pacer.step());
        assert!(pacer.step());
        pacer.step();
        pacer.reset();
        assert!(pacer.step());
    }

    #[test]
    fn test_ff_limiter() {
        let mut limiter = FastForwardLimiter::new();

        // 60 fps at 4x allows one frame every 4166 us.
        assert_eq!(limiter.delay(1_000_000, 60.0, true, 3), None);
        assert_eq!(
            limiter.delay(1_001_000, 60.0, true, 3),
            Some(Duration::from_millis(3))
        );
        assert_eq!(limiter.delay(1_100_000, 60.0, false, 3), None);
        assert_eq!(limiter.delay(1_101_000, 60.0, true, 0), None);
    }

    #[test]
    fn test_resync_ratio_bounds() {
        assert_eq!(resync_ratio(60.0, 60.0, false), 1.0);
        assert!((resync_ratio(60.0, 59.73, false) - 60.0 / 59.73).abs() < 1e-12);
        assert_eq!(resync_ratio(75.0, 60.0, false), 1.0 + MAX_RESYNC_DEVIATION);
        assert_eq!(resync_ratio(50.0, 60.0, false), 1.0 - MAX_RESYNC_DEVIATION);
        assert_eq!(resync_ratio(60.0, 59.73, true), 1.0);
        assert_eq!(resync_ratio(0.0, 59.73, false), 1.0);
    }

    #[test]
    fn test_frame_budget() {
        assert_eq!(frame_budget(50.0, Duration::from_millis(15)), FrameBudget::Sleep(Duration::from_millis(5)));
        assert_eq!(frame_budget(50.0, Duration::from_millis(20)), FrameBudget::Late);
        assert_eq!(frame_budget(50.0, Duration::from_millis(25)), FrameBudget::Late);
    }

    #[test]
    fn test_fps_counter() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(start);

        for i in 1..60 {
            assert_eq!(counter.tick(start + Duration::from_millis(i * 16)), None);
        }
        let fps = counter.tick(start + Duration::from_millis(1000)).unwrap();
        assert!((fps - 60.0).abs() < 1e-9);
        assert_eq!(counter.fps(), fps);
    }

    #[test]
    fn test_sram_autosave_coalesces() {
        let start = Instant::now();
        let mut autosave = SramAutosave::new(1);

        assert!(!autosave.update(1, start));
        assert!(!autosave.update(2, start + Duration::from_secs(1)));
        assert!(autosave.is_dirty());
        // A further change restarts the quiet period.
        assert!(!autosave.update(3, start + Duration::from_secs(4)));
        assert!(!autosave.update(3, start + Duration::from_secs(8)));
        assert!(autosave.update(3, start + Duration::from_secs(9)));
        assert!(!autosave.is_dirty());
        assert!(!autosave.update(3, start + Duration::from_secs(20)));
    }

    #[test]
    fn test_sram_change_and_revert_skips_write() {
        let start = Instant::now();
        let mut autosave = SramAutosave::new(1);

        autosave.update(2, start);
        autosave.update(1, start + Duration::from_secs(1));
        assert!(!autosave.update(1, start + Duration::from_secs(10)));
    }
}
