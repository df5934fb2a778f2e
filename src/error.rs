//! Error taxonomy for the dashboard service.
//!
//! Only [`UpstreamError`] and [`ValidationError`] ever reach the HTTP boundary.
//! [`CacheError`] is always absorbed by the cache-aside layer: a failing cache
//! backend degrades latency, never correctness.

use thiserror::Error;

/// Failure talking to the upstream analytics API.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The upstream answered with a status >= 400 after the retry budget was spent.
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never produced a response (connect, TLS, timeout).
    #[error("upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not in any known shape.
    #[error("upstream response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

impl UpstreamError {
    /// HTTP status reported by the upstream, if the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure against the cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Client-side input problems. Never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("window end {end} is not after start {start}")]
    EmptyWindow { start: String, end: String },

    #[error("both start and end must be supplied together")]
    PartialWindow,

    #[error("unsupported export format {0:?}; expected \"csv\" or \"pdf\"")]
    UnsupportedFormat(String),
}
