//! Exchange adapters, retrying fetcher and paginated downloader for trawl.
//!
//! This crate provides the ingestion pipeline:
//!
//! - [`Transport`] / [`HttpTransport`] - One GET request returning JSON
//! - [`RetryPolicy`] - Bounded attempts with linear, capped backoff
//! - [`RetryingFetcher`] - Retries transport and API-reported failures
//! - [`ExchangeAdapter`] - Per-exchange request and response translation
//! - [`CursorResolver`] - Finds the first cursor at or after a start time
//! - [`PaginatedDownloader`] - Resumable paging into a tick store

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/trawl/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod adapter;
mod downloader;
mod fetcher;
mod resolver;
mod retry;
mod transport;

#[cfg(test)]
mod sim;

pub use adapter::{CursorStrategy, ExchangeAdapter, Page, ParseError, adapter_for};
pub use downloader::{
    DownloadError, DownloadOutcome, DownloadReport, DownloadState, PageProgress,
    PaginatedDownloader, ProgressFn,
};
pub use fetcher::{AttemptError, FetchError, RetryingFetcher};
pub use resolver::{CursorResolver, Resolution};
pub use retry::RetryPolicy;
pub use transport::{ClientConfig, FnTransport, HttpTransport, Request, Transport, TransportError};
