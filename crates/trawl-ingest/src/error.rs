//! Ingestion errors.

use std::path::PathBuf;

use thiserror::Error;
use trawl_aggregate::AggregateError;
use trawl_fetch::DownloadError;
use trawl_store::StoreError;
use trawl_types::{Exchange, TimeRangeError, TrawlError};

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors raised by the coordinator and its configuration.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Paging failed for good or a page could not be stored.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Reading the tick store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Stored trades could not be aggregated.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// The query range is invalid.
    #[error(transparent)]
    Range(#[from] TimeRangeError),

    /// Unknown pair or an unreadable catalog.
    #[error(transparent)]
    Catalog(#[from] TrawlError),

    /// Nothing was ever ingested for the unit.
    #[error("No trades stored for {pair} on {exchange}")]
    NotFound {
        /// Exchange queried.
        exchange: Exchange,
        /// Pair queried.
        pair: String,
    },

    /// The coordinator has no transport or store for the exchange.
    #[error("Exchange {0} is not configured")]
    Unavailable(Exchange),

    /// The ingestion task ended without reporting.
    #[error("Ingestion of {pair} on {exchange} aborted")]
    Aborted {
        /// Exchange of the unit.
        exchange: Exchange,
        /// Pair of the unit.
        pair: String,
    },

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// Failed to read the configuration file.
    #[error("Failed to read config {path}: {source}")]
    ReadConfig {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the configuration file.
    #[error("Failed to parse config {path}: {source}")]
    ParseConfig {
        /// Path to the file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}
