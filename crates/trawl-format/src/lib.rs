//! Output formatters for the trawl trade-tick ingester.
//!
//! This crate provides formatters for writing trades and OHLCV bars:
//!
//! - [`CsvFormatter`] - CSV (or TSV) with a header row
//! - [`JsonFormatter`] - JSON array or NDJSON
//! - [`OutputFormat`] - Format selection by name

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/trawl/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod csv;
mod formatter;
mod json;

pub use crate::csv::CsvFormatter;
pub use formatter::{FormatError, Formatter, OutputFormat, formatter_for};
pub use json::{JsonFormatter, JsonStyle};
