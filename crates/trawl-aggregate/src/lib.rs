//! OHLCV aggregation for the trawl trade-tick ingester.
//!
//! This crate turns an ordered trade stream into a regular bar grid:
//!
//! - [`Bar`] - One bucket with OHLC, volume and side splits
//! - [`BarAggregator`] - Streaming, single-pass aggregator
//! - [`aggregate`] - Aggregates a whole slice at once

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/trawl/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod aggregator;
mod bar;

pub use aggregator::{AggregateError, BarAggregator, aggregate};
pub use bar::Bar;
