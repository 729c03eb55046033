//! Smoothed throughput and remaining-time estimation.

use std::collections::VecDeque;
use std::time::Instant;

/// Number of recent observations averaged into the reported speed.
pub const WINDOW: usize = 5;

/// One sampler output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Mean of the recent speed observations, in bytes per second.
    pub speed: f64,
    /// Seconds until `total_size` is reached at `speed`, when `speed` is positive.
    pub estimated: Option<f64>,
}

/// Converts cumulative byte counts observed on a fixed tick into a smoothed
/// speed and an ETA.
#[derive(Debug, Clone)]
pub struct ThroughputSampler {
    total_size: u64,
    last_tick: Instant,
    last_written: u64,
    recent: VecDeque<f64>,
    peak: f64,
}

impl ThroughputSampler {
    /// Creates a sampler for a batch of `total_size` bytes starting at `now`.
    #[must_use]
    pub fn new(total_size: u64, now: Instant) -> Self {
        Self {
            total_size,
            last_tick: now,
            last_written: 0,
            recent: VecDeque::with_capacity(WINDOW),
            peak: 0.0,
        }
    }

    /// Records the cumulative `written` count at `now`.
    ///
    /// Returns a sample only when bytes advanced since the previous tick. A
    /// count that went down (failed attempt rolled back) yields nothing.
    #[allow(clippy::cast_precision_loss)]
    pub fn tick(&mut self, now: Instant, written: u64) -> Option<Sample> {
        let elapsed = now.saturating_duration_since(self.last_tick).as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }

        let delta = written.saturating_sub(self.last_written);
        self.last_tick = now;
        self.last_written = written;

        if delta == 0 {
            return None;
        }

        if self.recent.len() == WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(delta as f64 / elapsed);

        let speed = self.recent.iter().sum::<f64>() / self.recent.len() as f64;
        self.peak = self.peak.max(speed);

        let estimated = (speed > 0.0)
            .then(|| self.total_size.saturating_sub(written) as f64 / speed);

        Some(Sample { speed, estimated })
    }

    /// Highest smoothed speed reported so far.
    #[must_use]
    pub const fn peak(&self) -> f64 {
        self.peak
    }
}
