//! Error types for feed sources

use thiserror::Error;

/// Errors that can occur while pulling a feed.
///
/// All of them are recoverable: the scheduler skips the source for the
/// current cycle and retries on a later one.
#[derive(Debug, Error)]
pub enum NewsError {
    /// HTTP request failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Source returned an error response
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },

    /// Body was neither RSS nor Atom
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Source did not answer within its fetch timeout
    #[error("Timed out after {0}s")]
    Timeout(u64),
}
