//! bulk-dl - A concurrent bulk-file downloader for application launchers.
//!
//! Fetches many files over HTTP under a bounded concurrency budget, reports
//! aggregate progress and smoothed throughput, and either aborts the whole
//! batch on the first failure (the default) or retries transient failures
//! per file.
//!
//! # Example
//!
//! ```no_run
//! use bulk_dl::{BatchEvent, DownloadConfig, Downloader, FileDescriptor};
//!
//! # async fn example() -> bulk_dl::Result<()> {
//! let downloader = Downloader::new(reqwest::Client::new(), DownloadConfig::default());
//!
//! let files = vec![
//!     FileDescriptor::new("https://example.com/a.jar", "libraries/a.jar")
//!         .with_type("libraries")
//!         .with_size(1024),
//! ];
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let printer = tokio::spawn(async move {
//!     while let Some(event) = rx.recv().await {
//!         if let BatchEvent::Progress { downloaded, total, .. } = event {
//!             println!("{downloaded}/{total}");
//!         }
//!     }
//! });
//!
//! let stats = downloader.download_batch(files, 1024, &tx).await?;
//! drop(tx);
//! let _ = printer.await;
//! println!("Downloaded {} files", stats.files_downloaded);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]

pub mod classify;
pub mod config;
pub mod download;
pub mod error;
pub mod event;
pub mod format;
pub mod fs;
pub mod manifest;
pub mod present;
pub mod sampler;
pub mod source;
pub mod stats;
pub mod worker;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export main types for convenience
pub use classify::is_transient;
pub use config::{AppConfig, DownloadConfig, HttpConfig, RetryPolicy};
pub use download::{Downloader, TransferOutcome};
pub use error::{Error, Result};
pub use event::{BatchEvent, BatchProgress, NoProgress};
pub use format::{format_bytes, format_duration, format_eta, format_speed};
pub use fs::{FileSystem, TokioFileSystem};
pub use manifest::{FileDescriptor, Manifest};
pub use present::{PresentedError, present};
pub use sampler::{Sample, ThroughputSampler};
pub use source::{ByteStream, HttpSource, Source};
pub use stats::{BatchStats, BatchStatsBuilder};
