//! Batch scheduling: bounded-concurrency downloads with retry and abort policy.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::time::DelayQueue;

use crate::classify;
use crate::config::{DownloadConfig, RetryPolicy};
use crate::error::{Error, Result};
use crate::event::BatchProgress;
use crate::fs::{FileSystem, TokioFileSystem};
use crate::manifest::FileDescriptor;
use crate::present::{PresentedError, present};
use crate::sampler::ThroughputSampler;
use crate::source::{HttpSource, Source};
use crate::stats::{BatchStats, BatchStatsBuilder};
use crate::worker;

/// How a finished attempt is settled.
#[derive(Debug)]
pub enum TransferOutcome {
    /// The file is on disk.
    Completed,
    /// The attempt failed transiently and the file goes back in the queue.
    Retried,
    /// The file failed. `fatal` failures abort the batch.
    Failed {
        /// What went wrong.
        error: Error,
        /// Whether the batch must be aborted.
        fatal: bool,
    },
}

/// Decides what a failed attempt means for the batch.
///
/// `attempts` counts the failed attempts so far, including this one.
#[must_use]
pub fn settle_failure(
    policy: RetryPolicy,
    error: Error,
    file: &FileDescriptor,
    attempts: u32,
    max_retries: u32,
) -> TransferOutcome {
    match policy {
        RetryPolicy::FailFast => TransferOutcome::Failed { error, fatal: true },
        RetryPolicy::Lenient if classify::is_transient(&error) => {
            if attempts <= max_retries {
                TransferOutcome::Retried
            } else {
                TransferOutcome::Failed {
                    error: Error::RetriesExhausted {
                        path: file.path.clone(),
                        attempts,
                        last: Box::new(error),
                    },
                    fatal: true,
                }
            }
        }
        RetryPolicy::Lenient => TransferOutcome::Failed {
            error,
            fatal: false,
        },
    }
}

/// A file waiting for (another) attempt.
#[derive(Debug)]
struct Queued {
    file: FileDescriptor,
    failures: u32,
}

/// Bookkeeping for one running worker.
struct InFlight {
    token: CancellationToken,
    bytes: u64,
    file_type: String,
}

/// Mutable state of one batch. Only the coordination loop touches it.
struct BatchState<'a> {
    total_size: u64,
    total_files: usize,
    pending: VecDeque<Queued>,
    in_flight: HashMap<u64, InFlight>,
    completed: usize,
    written: u64,
    fatal: Option<PresentedError>,
    next_id: u64,
    stats: BatchStatsBuilder,
    progress: &'a dyn BatchProgress,
}

impl BatchState<'_> {
    fn aborted(&self) -> bool {
        self.fatal.is_some()
    }

    fn record_chunk(&mut self, id: u64, bytes: u64) {
        let Some(entry) = self.in_flight.get_mut(&id) else {
            return;
        };
        entry.bytes += bytes;
        self.written += bytes;
        if self.fatal.is_none() {
            self.progress
                .on_progress(self.written, self.total_size, &entry.file_type);
        }
    }

    /// Removes a finished worker, rolling its bytes back out on failure.
    fn finish(&mut self, id: u64, failed: bool) {
        if let Some(entry) = self.in_flight.remove(&id)
            && failed
        {
            self.written = self.written.saturating_sub(entry.bytes);
        }
    }

    fn abort(&mut self, error: &Error, file: &FileDescriptor) {
        if self.aborted() {
            return;
        }
        log::error!("Aborting batch: {} ({error})", file.path.display());
        self.fatal = Some(present(error, Some(&file.path)));
        for entry in self.in_flight.values() {
            entry.token.cancel();
        }
        self.pending.clear();
    }
}

/// Core downloader that runs batches of file transfers.
pub struct Downloader<S: Source = HttpSource, F: FileSystem = TokioFileSystem> {
    source: S,
    fs: F,
    config: DownloadConfig,
}

impl Downloader<HttpSource, TokioFileSystem> {
    /// Creates a new downloader over HTTP with the default file system.
    #[must_use]
    pub const fn new(client: reqwest::Client, config: DownloadConfig) -> Self {
        Self {
            source: HttpSource::new(client),
            fs: TokioFileSystem,
            config,
        }
    }
}

impl<S: Source, F: FileSystem> Downloader<S, F> {
    /// Creates a downloader with a custom source and file system.
    #[must_use]
    pub const fn with_parts(source: S, fs: F, config: DownloadConfig) -> Self {
        Self { source, fs, config }
    }

    /// Returns a reference to the download configuration.
    #[must_use]
    pub const fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Returns a reference to the byte source.
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Downloads every file in `files`, at most `concurrency_limit` at a time.
    ///
    /// Files are started in the order given. Notifications go to `progress`;
    /// the returned future resolves only after the terminal notification
    /// ([`BatchProgress::on_complete`] or [`BatchProgress::on_error`]) has
    /// been delivered and every worker has unwound.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Aborted`] carrying the presented error when a fatal
    /// failure stopped the batch.
    pub async fn download_batch(
        &self,
        files: Vec<FileDescriptor>,
        total_size: u64,
        progress: &dyn BatchProgress,
    ) -> Result<BatchStats> {
        if files.is_empty() {
            progress.on_complete();
            return Ok(BatchStats::new());
        }

        let limit = self.config.effective_limit();
        log::info!(
            "Starting batch of {} file(s), {total_size} bytes, limit {limit}, policy {:?}",
            files.len(),
            self.config.retry_policy
        );

        let mut state = BatchState {
            total_size,
            total_files: files.len(),
            pending: files
                .into_iter()
                .map(|file| Queued { file, failures: 0 })
                .collect(),
            in_flight: HashMap::new(),
            completed: 0,
            written: 0,
            fatal: None,
            next_id: 0,
            stats: BatchStatsBuilder::new(),
            progress,
        };

        let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel::<(u64, u64)>();
        let mut running = FuturesUnordered::new();
        let mut delayed: DelayQueue<Queued> = DelayQueue::new();

        let period = self.config.sample_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sampler = ThroughputSampler::new(total_size, Instant::now().into_std());

        loop {
            while !state.aborted() && running.len() < limit {
                let Some(queued) = state.pending.pop_front() else {
                    break;
                };
                let id = state.next_id;
                state.next_id += 1;
                let token = CancellationToken::new();
                state.in_flight.insert(
                    id,
                    InFlight {
                        token: token.clone(),
                        bytes: 0,
                        file_type: queued.file.file_type.clone(),
                    },
                );
                log::debug!(
                    "Starting {} (attempt {})",
                    queued.file.path.display(),
                    queued.failures + 1
                );
                running.push(self.run_worker(id, queued, token, chunk_tx.clone()));
            }

            if running.is_empty() && delayed.is_empty() && state.pending.is_empty() {
                break;
            }

            tokio::select! {
                Some((id, bytes)) = chunk_rx.recv() => state.record_chunk(id, bytes),

                Some((id, queued, result)) = running.next(), if !running.is_empty() => {
                    // A worker's chunks are all queued before it returns.
                    while let Ok((chunk_id, bytes)) = chunk_rx.try_recv() {
                        state.record_chunk(chunk_id, bytes);
                    }
                    self.settle(&mut state, &mut delayed, id, queued, result);
                }

                Some(expired) = delayed.next(), if !delayed.is_empty() => {
                    let queued = expired.into_inner();
                    if state.aborted() {
                        state.completed += 1;
                    } else {
                        state.pending.push_back(queued);
                    }
                }

                _ = ticker.tick() => {
                    if let Some(sample) = sampler.tick(Instant::now().into_std(), state.written) {
                        progress.on_speed(sample.speed);
                        if let Some(eta) = sample.estimated {
                            progress.on_estimated(eta);
                        }
                    }
                }
            }
        }
        drop(ticker);

        debug_assert!(state.aborted() || state.completed == state.total_files);
        state.stats.set_peak_speed(sampler.peak());

        if let Some(presented) = state.fatal.take() {
            progress.on_error(&presented);
            return Err(Error::Aborted(Box::new(presented)));
        }

        let stats = state.stats.build();
        log::info!(
            "Batch complete: {} file(s), {} failed, {} retries, {} bytes",
            stats.files_downloaded,
            stats.files_failed,
            stats.retries,
            stats.total_bytes
        );
        progress.on_complete();
        Ok(stats)
    }

    async fn run_worker(
        &self,
        id: u64,
        queued: Queued,
        token: CancellationToken,
        chunk_tx: mpsc::UnboundedSender<(u64, u64)>,
    ) -> (u64, Queued, Result<u64>) {
        let on_chunk = move |bytes: u64| {
            let _ = chunk_tx.send((id, bytes));
        };
        let result = worker::transfer(
            &self.source,
            &self.fs,
            &queued.file,
            token,
            self.config.per_file_timeout,
            &on_chunk,
        )
        .await;
        (id, queued, result)
    }

    fn settle(
        &self,
        state: &mut BatchState<'_>,
        delayed: &mut DelayQueue<Queued>,
        id: u64,
        mut queued: Queued,
        result: Result<u64>,
    ) {
        let error = match result {
            Ok(bytes) => {
                state.finish(id, false);
                state.completed += 1;
                state.stats.add_download(bytes);
                log::debug!("Finished {} ({bytes} bytes)", queued.file.path.display());
                return;
            }
            Err(e) => e,
        };

        state.finish(id, true);

        if state.aborted() {
            // Fallout from the abort; the first failure already spoke.
            log::debug!("{} stopped: {error}", queued.file.path.display());
            state.completed += 1;
            return;
        }

        queued.failures += 1;
        match settle_failure(
            self.config.retry_policy,
            error,
            &queued.file,
            queued.failures,
            self.config.max_retries,
        ) {
            TransferOutcome::Retried => {
                log::warn!(
                    "Retrying {} in {:?} (attempt {} failed)",
                    queued.file.path.display(),
                    self.config.retry_delay,
                    queued.failures
                );
                state.stats.add_retry();
                delayed.insert(queued, self.config.retry_delay);
            }
            TransferOutcome::Failed { error, fatal: true } => {
                state.completed += 1;
                state.abort(&error, &queued.file);
                let drained = delayed.len();
                delayed.clear();
                state.completed += drained;
            }
            TransferOutcome::Failed { error, fatal: false } => {
                log::warn!("Skipping {}: {error}", queued.file.path.display());
                state.completed += 1;
                state.stats.add_failure();
                state
                    .progress
                    .on_file_error(&present(&error, Some(&queued.file.path)));
            }
            TransferOutcome::Completed => unreachable!("failures never settle as completed"),
        }
    }
}
