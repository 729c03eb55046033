//! User-facing error presentation.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::classify;
use crate::error::Error;

/// Friendly message for transient network failures.
pub const NETWORK_MESSAGE: &str =
    "The connection to the download server was interrupted. Check your internet connection and try again.";
/// Friendly message for files the server refused to serve.
pub const SERVER_MESSAGE: &str =
    "The download server could not provide a required file. Please try again later.";
/// Friendly message for local disk failures.
pub const DISK_MESSAGE: &str =
    "Game files could not be written to disk. Check free space and folder permissions.";
/// Friendly message for anything else.
pub const UNKNOWN_MESSAGE: &str = "An unknown error occurred while downloading game files.";

/// A failure normalized for display to the end user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentedError {
    /// Primary message, safe to show as-is.
    pub message: String,
    /// Short, non-technical explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_message: Option<String>,
    /// Original technical message, when it differs from the friendly one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Destination path of the file that failed, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl fmt::Display for PresentedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(file) = &self.file {
            write!(f, " ({})", file.display())?;
        }
        Ok(())
    }
}

/// Maps a raw failure to its user-facing form.
#[must_use]
pub fn present(error: &Error, file: Option<&Path>) -> PresentedError {
    let friendly = friendly_message(error);
    let technical = error.to_string();
    let details = (technical != friendly).then_some(technical);

    PresentedError {
        message: friendly.to_string(),
        friendly_message: Some(friendly.to_string()),
        details,
        file: file.map(Path::to_path_buf),
    }
}

/// Picks the friendly message using the same signals as the transient classifier.
#[must_use]
pub fn friendly_message(error: &Error) -> &'static str {
    match error {
        Error::RetriesExhausted { last, .. } => friendly_message(last),
        Error::Status { .. } => SERVER_MESSAGE,
        e if classify::is_transient(e) => NETWORK_MESSAGE,
        Error::Io(_) => DISK_MESSAGE,
        _ => UNKNOWN_MESSAGE,
    }
}
