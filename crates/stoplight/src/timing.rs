//! Workload timing, derived from one base tick.

use std::time::Duration;

/// All workload timeouts as multiples of a base tick.
///
/// The defaults follow the interactive demo (one-second tick); tests shrink
/// the tick to keep the suite fast without changing any ratio.
#[derive(Debug, Clone, Copy)]
pub struct TimingProfile {
    tick: Duration,
}

impl TimingProfile {
    /// Profile with the given base tick.
    pub fn new(tick: Duration) -> Self {
        Self { tick }
    }

    /// Profile with a tick of `ms` milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// The base tick.
    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Green and red phase length.
    pub fn t_norm(&self) -> Duration {
        self.tick * 10
    }

    /// Yellow phase length.
    pub fn t_fast(&self) -> Duration {
        self.tick * 3
    }

    /// Shortened green after a button press; also the minimum green time a
    /// press is honored at.
    pub fn t_but(&self) -> Duration {
        self.tick
    }

    /// Walk time before the blinking warning starts.
    pub fn t_walk(&self) -> Duration {
        self.tick * 7
    }
}

impl Default for TimingProfile {
    fn default() -> Self {
        Self::from_millis(1000)
    }
}
