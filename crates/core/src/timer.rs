//! High-resolution timer for frame timing.

use std::time::{Duration, Instant};

/// High-resolution timer for measuring frame times.
///
/// Besides the per-frame delta, the timer accumulates frames over a reporting
/// window so the driver can log an average frame time periodically.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
    window_start: Instant,
    window_frames: u32,
    total_frames: u64,
}

/// Average frame timing over one reporting window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Frames counted in the window
    pub frames: u32,
    /// Mean time per frame
    pub average: Duration,
}

impl FrameReport {
    /// Frames per second implied by the average frame time.
    pub fn fps(&self) -> f32 {
        let secs = self.average.as_secs_f32();
        if secs > 0.0 { 1.0 / secs } else { 0.0 }
    }
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    fn starting_at(now: Instant) -> Self {
        Self {
            start: now,
            last_tick: now,
            window_start: now,
            window_frames: 0,
            total_frames: 0,
        }
    }

    /// Get the total elapsed time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Marks the end of a frame and returns the time since the previous one.
    pub fn tick(&mut self) -> Duration {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> Duration {
        let delta = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.window_frames += 1;
        self.total_frames += 1;
        delta
    }

    /// Total frames ticked since creation or the last reset.
    pub fn frame_count(&self) -> u64 {
        self.total_frames
    }

    /// Returns the average frame time once `interval` has passed since the
    /// previous report, and starts a new window.
    pub fn report(&mut self, interval: Duration) -> Option<FrameReport> {
        self.report_at(Instant::now(), interval)
    }

    fn report_at(&mut self, now: Instant, interval: Duration) -> Option<FrameReport> {
        let window = now.saturating_duration_since(self.window_start);
        if window < interval || self.window_frames == 0 {
            return None;
        }

        let report = FrameReport {
            frames: self.window_frames,
            average: window / self.window_frames,
        };
        self.window_start = now;
        self.window_frames = 0;
        Some(report)
    }

    /// Starts a fresh reporting window without touching the frame count.
    /// Time before the call is excluded from the next report.
    pub fn restart_window(&mut self) {
        self.restart_window_at(Instant::now());
    }

    fn restart_window_at(&mut self, now: Instant) {
        self.last_tick = now;
        self.window_start = now;
        self.window_frames = 0;
    }

    /// Frames counted in the current reporting window.
    #[inline]
    pub fn window_frames(&self) -> u32 {
        self.window_frames
    }

    /// Time since the current reporting window started.
    pub fn window_elapsed(&self) -> Duration {
        self.window_start.elapsed()
    }

    /// Reset the timer to the current time.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counts_frames() {
        let t0 = Instant::now();
        let mut timer = Timer::starting_at(t0);

        let delta = timer.tick_at(t0 + Duration::from_millis(16));
        assert_eq!(delta, Duration::from_millis(16));
        timer.tick_at(t0 + Duration::from_millis(33));
        assert_eq!(timer.frame_count(), 2);
    }

    #[test]
    fn test_report_waits_for_interval() {
        let t0 = Instant::now();
        let mut timer = Timer::starting_at(t0);
        timer.tick_at(t0 + Duration::from_millis(10));

        assert!(
            timer
                .report_at(t0 + Duration::from_millis(500), Duration::from_secs(1))
                .is_none()
        );
    }

    #[test]
    fn test_report_averages_and_restarts_window() {
        let t0 = Instant::now();
        let mut timer = Timer::starting_at(t0);
        for i in 1..=4 {
            timer.tick_at(t0 + Duration::from_millis(250 * i));
        }

        let report = timer
            .report_at(t0 + Duration::from_secs(1), Duration::from_secs(1))
            .unwrap();
        assert_eq!(report.frames, 4);
        assert_eq!(report.average, Duration::from_millis(250));
        assert!((report.fps() - 4.0).abs() < 1e-3);

        // New window has no frames yet.
        assert!(
            timer
                .report_at(t0 + Duration::from_secs(3), Duration::from_secs(1))
                .is_none()
        );
        assert_eq!(timer.frame_count(), 4);
    }

    #[test]
    fn test_restart_window_excludes_paused_time() {
        let t0 = Instant::now();
        let mut timer = Timer::starting_at(t0);
        timer.tick_at(t0 + Duration::from_millis(10));

        // Ten seconds idle, then two 10 ms frames
        let resumed = t0 + Duration::from_secs(10);
        timer.restart_window_at(resumed);
        assert_eq!(timer.window_frames(), 0);
        assert_eq!(timer.tick_at(resumed + Duration::from_millis(10)), Duration::from_millis(10));
        timer.tick_at(resumed + Duration::from_millis(20));

        let report = timer
            .report_at(resumed + Duration::from_millis(20), Duration::from_millis(20))
            .unwrap();
        assert_eq!(report.frames, 2);
        assert_eq!(report.average, Duration::from_millis(10));
        assert_eq!(timer.frame_count(), 3);
    }
}
