//! Error types for trawl.

use thiserror::Error;

/// Result type alias for trawl operations.
pub type Result<T> = std::result::Result<T, TrawlError>;

/// Errors shared by the trawl crates.
#[derive(Error, Debug)]
pub enum TrawlError {
    /// Invalid data format.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Exchange not supported.
    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    /// Pair not listed for the exchange.
    #[error("Unknown pair {pair} on {exchange}")]
    UnknownPair {
        /// Exchange name.
        exchange: String,
        /// Pair identifier.
        pair: String,
    },

    /// Invalid time range.
    #[error(transparent)]
    TimeRange(#[from] TimeRangeError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error for invalid time ranges.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeRangeError {
    /// Start is after end.
    #[error("Invalid time range: {start} > {end}")]
    InvalidRange {
        /// Range start (UNIX seconds).
        start: i64,
        /// Range end (UNIX seconds).
        end: i64,
    },

    /// A bound could not be parsed.
    #[error("Invalid timestamp '{0}'")]
    InvalidTimestamp(String),
}
