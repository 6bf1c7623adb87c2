//! Per-tick wall-clock budget.

use std::time::{Duration, Instant};

/// One frame at 60 Hz.
pub const DEFAULT_FRAME: Duration = Duration::from_micros(16_667);

/// Elapsed time since the start of a tick, measured in frames.
///
/// Deadlines are fractions of the frame: a step guarded by `within(0.5)`
/// only starts while less than half the frame has been spent.
#[derive(Clone, Copy, Debug)]
pub struct FrameBudget {
    start: Instant,
    frame: Duration,
}

impl FrameBudget {
    pub fn start(frame: Duration) -> Self {
        Self {
            start: Instant::now(),
            frame: frame.max(Duration::from_micros(1)),
        }
    }

    /// A budget that never runs out.
    pub fn unlimited() -> Self {
        Self::start(Duration::from_secs(u32::MAX as u64))
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn fraction(&self) -> f32 {
        self.elapsed().as_secs_f32() / self.frame.as_secs_f32()
    }

    pub fn within(&self, deadline: f32) -> bool {
        self.fraction() < deadline
    }
}

impl Default for FrameBudget {
    fn default() -> Self {
        Self::start(DEFAULT_FRAME)
    }
}
