//! Append-only tick storage for the trawl trade-tick ingester.
//!
//! - [`TickStore`] - Storage interface keyed by pair
//! - [`CsvTickStore`] - One header-first CSV file per pair
//! - [`MemoryTickStore`] - In-memory store for tests
//! - [`StoreError`] - Storage failures

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/trawl/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod csv;
mod error;
mod memory;
mod store;

pub use csv::{BASE_COLUMNS, CsvTickStore};
pub use error::StoreError;
pub use memory::MemoryTickStore;
pub use store::{TickStore, check_order, trailing_run};
