//! Query command implementations.
//!
//! `trades` reads the local store as is; `bars` ingests through the end
//! time first, then aggregates.

use crate::display::{Format, parse_time, unit_progress, write_bars, write_trades};
use anyhow::{Context, Result};
use std::path::PathBuf;
use trawl_lib::prelude::*;
use trawl_lib::time;

/// Print stored trades for a pair.
pub(crate) async fn trades(
    config: TrawlConfig,
    exchange: Exchange,
    pair: &str,
    start_str: Option<&str>,
    end_str: Option<&str>,
    output: Option<PathBuf>,
    format: Format,
) -> Result<()> {
    let start = parse_time(start_str, 0)?;
    let end = parse_time(end_str, time::now())?;

    let coordinator = IngestionCoordinator::new(config).context("Failed to open the store")?;
    let trades = coordinator.get_trades(exchange, pair, start, end).await?;
    tracing::info!(%exchange, pair, count = trades.len(), "Read trades");

    write_trades(&trades, output.as_deref(), format)
}

/// Ingest a pair through the end time and print its bars.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn bars(
    config: TrawlConfig,
    exchange: Exchange,
    pair: &str,
    start_str: &str,
    end_str: Option<&str>,
    interval: Interval,
    output: Option<PathBuf>,
    format: Format,
    quiet: bool,
) -> Result<()> {
    let start = parse_time(Some(start_str), 0)?;
    let end = parse_time(end_str, time::now())?;
    let range = TimeRange::new(start, end)?;

    let mut coordinator =
        IngestionCoordinator::new(config).context("Failed to set up ingestion")?;
    if let Some(progress) = unit_progress(start, quiet) {
        coordinator = coordinator.with_progress(progress);
    }

    let bars = coordinator
        .get_bars(exchange, pair, range, interval)
        .await
        .with_context(|| format!("Failed to build {interval} bars for {pair} on {exchange}"))?;

    write_bars(&bars, output.as_deref(), format)?;
    if let Some(path) = &output
        && !quiet
    {
        eprintln!("{} bars written to: {}", bars.len(), path.display());
    }
    Ok(())
}
