//! Core types for the trawl trade-tick ingester.
//!
//! This crate provides the fundamental data structures used throughout trawl:
//!
//! - [`Trade`] - A single executed trade in canonical form
//! - [`Side`] - Aggressor side of a trade
//! - [`Cursor`] - Resumption token for paginated exchange APIs
//! - [`Exchange`] - Supported exchanges
//! - [`TimeRange`] - Inclusive UNIX-second range for queries
//! - [`Interval`] - Bar width for OHLCV aggregation
//! - [`time`] - UNIX / ISO-8601 conversions

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/trawl/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cursor;
mod error;
mod exchange;
mod interval;
mod time_range;
mod trade;
pub mod time;

pub use cursor::Cursor;
pub use error::{Result, TimeRangeError, TrawlError};
pub use exchange::{Exchange, ExchangeParseError};
pub use interval::{Interval, IntervalParseError};
pub use time_range::TimeRange;
pub use trade::{Side, SideParseError, Trade};
