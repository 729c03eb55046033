//! Transient-failure classification.
//!
//! Decides whether a failed transfer is worth retrying. Only the lenient
//! retry policy consults this; fail-fast treats every failure as fatal.

use std::error::Error as StdError;
use std::io;

use crate::error::Error;

/// Substrings that mark an error message as a transient network hiccup.
const TRANSIENT_HINTS: &[&str] = &[
    "timeout",
    "timed out",
    "network",
    "fetch failed",
    "aborted",
    "socket",
    "temporarily unavailable",
    "temporary failure",
    "connection reset",
    "connection closed",
];

/// Returns `true` if the error is a transient network failure worth retrying.
#[must_use]
pub fn is_transient(error: &Error) -> bool {
    match error {
        Error::Timeout { .. } | Error::Cancelled => true,
        Error::Http(e) => e.is_timeout() || e.is_connect() || chain_is_transient(e),
        Error::Io(e) => io_is_transient(e),
        Error::Status { .. }
        | Error::RetriesExhausted { .. }
        | Error::Config(_)
        | Error::Manifest(_)
        | Error::Aborted(_) => false,
    }
}

/// Returns `true` if the message contains one of the transient hints.
#[must_use]
pub fn has_transient_hint(message: &str) -> bool {
    let message = message.to_lowercase();
    TRANSIENT_HINTS.iter().any(|hint| message.contains(hint))
}

fn io_is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    ) || has_transient_hint(&error.to_string())
}

/// Walks the source chain looking for a transient I/O code or message.
fn chain_is_transient(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<io::Error>()
            && io_is_transient(io_err)
        {
            return true;
        }
        if has_transient_hint(&err.to_string()) {
            return true;
        }
        current = err.source();
    }
    false
}
