//! Error types for the bulk-dl library.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::present::PresentedError;

/// Errors that can occur during download operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level HTTP error (connect, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered with a non-success status.
    #[error("Download failed ({status} {reason}) for {url}")]
    Status {
        /// Numeric HTTP status code.
        status: u16,
        /// Canonical reason phrase, empty when unknown.
        reason: String,
        /// Requested URL.
        url: String,
    },

    /// The per-file timeout fired before the transfer made progress.
    #[error("Request timed out after {}ms", after.as_millis())]
    Timeout {
        /// The timeout that elapsed.
        after: Duration,
    },

    /// The transfer was cancelled because the batch was aborted.
    #[error("Download aborted")]
    Cancelled,

    /// A file kept failing with transient errors until its retry budget ran out.
    #[error("Giving up on {} after {attempts} attempts: {last}", path.display())]
    RetriesExhausted {
        /// Destination path of the file.
        path: PathBuf,
        /// Number of attempts made.
        attempts: u32,
        /// The last failure observed.
        last: Box<Error>,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The file list could not be read or parsed.
    #[error("Invalid manifest: {0}")]
    Manifest(String),

    /// The batch was aborted by a fatal error.
    #[error("{}", .0.message)]
    Aborted(Box<PresentedError>),
}

impl Error {
    /// Builds a status error from an HTTP status code and the requested URL.
    #[must_use]
    pub fn status(status: reqwest::StatusCode, url: &str) -> Self {
        Self::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            url: url.to_string(),
        }
    }
}

/// A specialized `Result` type for bulk-dl operations.
pub type Result<T> = std::result::Result<T, Error>;
