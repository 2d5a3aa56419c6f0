//! Storage errors.

use thiserror::Error;

/// Errors raised by a [`crate::TickStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding or decoding failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv_async::Error),

    /// Stored data could not be decoded.
    #[error("Corrupt record in {pair}: {reason}")]
    Corrupt {
        /// Pair whose log is damaged.
        pair: String,
        /// What was wrong.
        reason: String,
    },

    /// Columns differ from the ones this store reads and writes.
    #[error("Schema mismatch for {pair}: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        /// Pair being written.
        pair: String,
        /// Columns this store uses.
        expected: Vec<String>,
        /// Columns found in the log or offered by the write.
        found: Vec<String>,
    },

    /// Appending would break timestamp or sequence ordering.
    #[error("Out-of-order append for {pair}: {reason}")]
    OutOfOrder {
        /// Pair being written.
        pair: String,
        /// Which ordering rule was violated.
        reason: String,
    },
}
