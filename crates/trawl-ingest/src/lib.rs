//! Ingestion coordinator for the trawl trade-tick ingester.
//!
//! - [`TrawlConfig`] - Immutable configuration, loadable from JSON
//! - [`IngestionCoordinator`] - Ingests units and answers trade and bar queries
//! - [`IngestSummary`] - Per-unit outcomes of a batch run
//! - [`IngestError`] - Everything that can stop a unit or a query

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/trawl/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod coordinator;
mod error;

pub use config::{DEFAULT_CONCURRENCY, ExchangeSettings, TrawlConfig};
pub use coordinator::{Backend, IngestSummary, IngestionCoordinator, UnitOutcome};
pub use error::{IngestError, Result};
