//! Ingest-all command implementation.
//!
//! Runs every catalogued pair through the coordinator's worker pool and
//! reports per-pair outcomes.

use crate::display::{parse_time, print_report, print_reports_json, unit_progress};
use anyhow::{Context, Result};
use trawl_lib::prelude::*;
use trawl_lib::time;

/// Ingest trades for every catalogued pair.
pub(crate) async fn ingest_all(
    config: TrawlConfig,
    start_str: Option<&str>,
    end_str: Option<&str>,
    concurrency: Option<usize>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let start = parse_time(start_str, 0)?;
    let end = parse_time(end_str, time::now())?;
    let concurrency = concurrency.unwrap_or(config.concurrency);

    let mut coordinator =
        IngestionCoordinator::new(config).context("Failed to set up ingestion")?;
    if coordinator.catalog().is_empty() {
        anyhow::bail!("No pairs configured");
    }
    if let Some(progress) = unit_progress(start, quiet || json) {
        coordinator = coordinator.with_progress(progress);
    }

    let summary = coordinator.ingest_all(start, end, concurrency).await;

    if json {
        print_reports_json(summary.succeeded())?;
    } else if !quiet {
        for report in summary.succeeded() {
            print_report(report);
        }
        eprintln!("\nIngestion complete:");
        eprintln!("  Successful: {}", summary.succeeded().count());
        eprintln!("  Trades appended: {}", summary.appended());
    }

    let failed: Vec<_> = summary.failed().collect();
    if !failed.is_empty() {
        eprintln!("  Failed: {}", failed.len());
        for unit in &failed {
            if let Err(e) = &unit.result {
                eprintln!("    {}/{}: {e}", unit.exchange, unit.pair);
            }
        }
        anyhow::bail!(
            "{} out of {} pairs failed",
            failed.len(),
            summary.units.len()
        );
    }

    Ok(())
}
