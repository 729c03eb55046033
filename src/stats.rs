//! Batch statistics.

use std::time::{Duration, Instant};

/// Summary of a finished batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchStats {
    /// Number of files successfully downloaded.
    pub files_downloaded: usize,
    /// Number of files that failed without aborting the batch.
    pub files_failed: usize,
    /// Number of re-queued attempts.
    pub retries: usize,
    /// Total bytes kept on disk.
    pub total_bytes: u64,
    /// Total elapsed time for the batch.
    pub elapsed: Duration,
    /// Peak smoothed speed in bytes per second.
    pub peak_speed: f64,
}

impl Default for BatchStats {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchStats {
    /// Creates a new empty batch stats.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            files_downloaded: 0,
            files_failed: 0,
            retries: 0,
            total_bytes: 0,
            elapsed: Duration::ZERO,
            peak_speed: 0.0,
        }
    }

    /// Returns the average download speed in bytes per second.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_speed(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_bytes as f64 / secs
        } else {
            0.0
        }
    }
}

/// Builder for accumulating batch statistics while the batch runs.
#[derive(Debug)]
pub struct BatchStatsBuilder {
    files_downloaded: usize,
    files_failed: usize,
    retries: usize,
    total_bytes: u64,
    start_time: Instant,
    peak_speed: f64,
}

impl Default for BatchStatsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchStatsBuilder {
    /// Creates a new builder; the clock starts now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            files_downloaded: 0,
            files_failed: 0,
            retries: 0,
            total_bytes: 0,
            start_time: Instant::now(),
            peak_speed: 0.0,
        }
    }

    /// Records a completed file.
    pub const fn add_download(&mut self, bytes: u64) {
        self.files_downloaded += 1;
        self.total_bytes += bytes;
    }

    /// Records a file that failed without aborting the batch.
    pub const fn add_failure(&mut self) {
        self.files_failed += 1;
    }

    /// Records a re-queued attempt.
    pub const fn add_retry(&mut self) {
        self.retries += 1;
    }

    /// Sets the peak speed observed.
    pub const fn set_peak_speed(&mut self, speed: f64) {
        self.peak_speed = speed;
    }

    /// Builds the final statistics.
    #[must_use]
    pub fn build(self) -> BatchStats {
        BatchStats {
            files_downloaded: self.files_downloaded,
            files_failed: self.files_failed,
            retries: self.retries,
            total_bytes: self.total_bytes,
            elapsed: self.start_time.elapsed(),
            peak_speed: self.peak_speed,
        }
    }
}
