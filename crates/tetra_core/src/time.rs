//! Frame pacing
//!
//! The whole program advances one frame at a time at a fixed target rate.
//! Audio budgets (bytes per frame) are derived from the same rate.

use std::time::Duration;

/// Default frame rate (60 Hz = 16.666ms per frame)
pub const DEFAULT_TARGET_HZ: u32 = 60;

/// Tracks frame count and elapsed time against a fixed target rate.
#[derive(Debug, Clone)]
pub struct FrameClock {
    target_hz: u32,
    frame_duration: Duration,
    frame_count: u64,
    elapsed: Duration,
}

impl FrameClock {
    pub fn new(target_hz: u32) -> Self {
        let target_hz = target_hz.max(1);
        Self {
            target_hz,
            frame_duration: Duration::from_secs(1) / target_hz,
            frame_count: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn target_hz(&self) -> u32 {
        self.target_hz
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn total_time(&self) -> Duration {
        self.elapsed
    }

    /// Record a finished frame that took `dt` of wall time.
    pub fn advance(&mut self, dt: Duration) {
        self.frame_count += 1;
        self.elapsed += dt;
    }

    /// Time left to sleep after a frame whose work took `compute`.
    ///
    /// `None` means the frame overran its budget.
    pub fn sleep_budget(&self, compute: Duration) -> Option<Duration> {
        self.frame_duration.checked_sub(compute)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_HZ)
    }
}
