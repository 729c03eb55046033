//! Batch notifications.

use tokio::sync::mpsc;

use crate::present::PresentedError;

/// Trait for receiving batch download notifications.
///
/// All methods have default no-op implementations. Exactly one of
/// [`on_complete`](Self::on_complete) or [`on_error`](Self::on_error) is
/// called per batch, and it is always the last call.
pub trait BatchProgress: Send + Sync {
    /// Called for every received chunk with the cumulative byte count.
    fn on_progress(&self, _downloaded: u64, _total: u64, _file_type: &str) {}

    /// Called on a sampler tick with the smoothed speed in bytes per second.
    fn on_speed(&self, _bytes_per_sec: f64) {}

    /// Called alongside [`on_speed`](Self::on_speed) with the estimated seconds remaining.
    fn on_estimated(&self, _seconds_remaining: f64) {}

    /// Called when a single file fails without aborting the batch.
    fn on_file_error(&self, _error: &PresentedError) {}

    /// Called once when the batch is aborted.
    fn on_error(&self, _error: &PresentedError) {}

    /// Called once when every file has been downloaded.
    fn on_complete(&self) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl BatchProgress for NoProgress {}

/// Batch notifications as a tagged value, for channel-based consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// Cumulative bytes downloaded.
    Progress {
        /// Bytes received across the batch so far.
        downloaded: u64,
        /// Expected size of the whole batch.
        total: u64,
        /// Type tag of the file the chunk belongs to.
        file_type: String,
    },
    /// Smoothed speed in bytes per second.
    Speed(f64),
    /// Estimated seconds remaining.
    Estimated(f64),
    /// A single file failed; the batch continues.
    FileError(PresentedError),
    /// The batch was aborted. Terminal.
    Error(PresentedError),
    /// The batch finished. Terminal.
    Complete,
}

impl BatchEvent {
    /// Returns `true` for the completion and fatal-error events.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Complete)
    }
}

impl BatchProgress for mpsc::UnboundedSender<BatchEvent> {
    fn on_progress(&self, downloaded: u64, total: u64, file_type: &str) {
        let _ = self.send(BatchEvent::Progress {
            downloaded,
            total,
            file_type: file_type.to_string(),
        });
    }

    fn on_speed(&self, bytes_per_sec: f64) {
        let _ = self.send(BatchEvent::Speed(bytes_per_sec));
    }

    fn on_estimated(&self, seconds_remaining: f64) {
        let _ = self.send(BatchEvent::Estimated(seconds_remaining));
    }

    fn on_file_error(&self, error: &PresentedError) {
        let _ = self.send(BatchEvent::FileError(error.clone()));
    }

    fn on_error(&self, error: &PresentedError) {
        let _ = self.send(BatchEvent::Error(error.clone()));
    }

    fn on_complete(&self) {
        let _ = self.send(BatchEvent::Complete);
    }
}
