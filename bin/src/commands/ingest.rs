//! Ingest command implementation.
//!
//! Brings one pair's local trade log up to the requested end time.

use crate::display::{parse_time, print_report, print_reports_json, unit_progress};
use anyhow::{Context, Result};
use trawl_lib::prelude::*;
use trawl_lib::time;

/// Ingest trades for a single pair.
pub(crate) async fn ingest(
    config: TrawlConfig,
    exchange: Exchange,
    pair: &str,
    start_str: Option<&str>,
    end_str: Option<&str>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let start = parse_time(start_str, 0)?;
    let end = parse_time(end_str, time::now())?;

    let mut coordinator =
        IngestionCoordinator::new(config).context("Failed to set up ingestion")?;
    if let Some(progress) = unit_progress(start, quiet || json) {
        coordinator = coordinator.with_progress(progress);
    }

    let report = coordinator
        .ingest(exchange, pair, start, end)
        .await
        .with_context(|| format!("Failed to ingest {pair} from {exchange}"))?;

    if json {
        print_reports_json([&report])?;
    } else if !quiet {
        print_report(&report);
    }
    Ok(())
}
