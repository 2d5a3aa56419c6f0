//! Resumable crypto trade-tick ingestion and OHLCV aggregation.
//!
//! This is a facade crate that re-exports functionality from the trawl
//! workspace crates for convenient access.
//!
//! # Quick Start
//!
//! ```ignore
//! use trawl_lib::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let coordinator = IngestionCoordinator::new(TrawlConfig::default())?;
//!
//!     let range = TimeRange::parse("2018-01-01T00:00:00Z", "2018-01-02T00:00:00Z")?;
//!     let interval: Interval = "1h".parse()?;
//!     let bars = coordinator
//!         .get_bars(Exchange::Coinbase, "BTC-USD", range, interval)
//!         .await?;
//!
//!     for bar in bars {
//!         println!("{} close={} volume={}", bar.bucket_end_time, bar.close, bar.volume);
//!     }
//!     Ok(())
//! }
//! ```

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/trawl/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use trawl_types::*;

// Re-export the pair catalog
pub use trawl_catalog::PairCatalog;

// Re-export fetch functionality
#[cfg(feature = "fetch")]
pub use trawl_fetch::{
    ClientConfig, CursorResolver, CursorStrategy, DownloadError, DownloadOutcome, DownloadReport,
    DownloadState, ExchangeAdapter, FetchError, FnTransport, HttpTransport, Page, PageProgress,
    PaginatedDownloader, ParseError, ProgressFn, Request, Resolution, RetryPolicy,
    RetryingFetcher, Transport, TransportError, adapter_for,
};

#[cfg(feature = "fetch")]
pub use trawl_store::{CsvTickStore, MemoryTickStore, StoreError, TickStore};

// Re-export aggregation
#[cfg(feature = "aggregate")]
pub use trawl_aggregate::{AggregateError, Bar, BarAggregator, aggregate};

// Re-export formatters
#[cfg(feature = "format")]
pub use trawl_format::{
    CsvFormatter, FormatError, Formatter, JsonFormatter, JsonStyle, OutputFormat, formatter_for,
};

// Re-export the coordinator
#[cfg(feature = "ingest")]
pub use trawl_ingest::{
    Backend, ExchangeSettings, IngestError, IngestSummary, IngestionCoordinator, TrawlConfig,
    UnitOutcome,
};

/// Prelude module for convenient imports.
///
/// ```
/// use trawl_lib::prelude::*;
/// ```
pub mod prelude {
    pub use trawl_types::{
        Cursor, Exchange, Interval, Result, Side, TimeRange, TimeRangeError, Trade, TrawlError,
    };

    pub use trawl_catalog::PairCatalog;

    #[cfg(feature = "fetch")]
    pub use trawl_fetch::{
        DownloadOutcome, DownloadReport, PageProgress, PaginatedDownloader, RetryPolicy,
        RetryingFetcher, adapter_for,
    };

    #[cfg(feature = "fetch")]
    pub use trawl_store::{CsvTickStore, TickStore};

    #[cfg(feature = "aggregate")]
    pub use trawl_aggregate::{Bar, BarAggregator, aggregate};

    #[cfg(feature = "format")]
    pub use trawl_format::{CsvFormatter, Formatter, JsonFormatter, OutputFormat, formatter_for};

    #[cfg(feature = "ingest")]
    pub use trawl_ingest::{IngestionCoordinator, IngestSummary, TrawlConfig};
}
