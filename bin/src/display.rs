//! Display utilities and output formatting for the trawl CLI.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use clap::ValueEnum;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use trawl_lib::prelude::*;
use trawl_lib::{PageProgress, ProgressFn, time};

/// Output format for query results.
#[derive(Clone, Copy, ValueEnum)]
pub(crate) enum Format {
    Csv,
    Tsv,
    Json,
    Ndjson,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => Self::Csv,
            Format::Tsv => Self::Tsv,
            Format::Json => Self::Json,
            Format::Ndjson => Self::Ndjson,
        }
    }
}

/// Parses a time argument (ISO-8601, date or UNIX seconds).
pub(crate) fn parse_time(value: Option<&str>, default: i64) -> Result<i64> {
    value.map_or(Ok(default), |s| {
        time::iso_to_unix(s).with_context(|| format!("Invalid time: {s}"))
    })
}

/// Opens the output file, or stdout when no path is given.
fn open_output(output: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    })
}

/// Print download reports as one JSON array.
pub(crate) fn print_reports_json<'a>(reports: impl IntoIterator<Item = &'a DownloadReport>) -> Result<()> {
    let reports: Vec<_> = reports.into_iter().collect();
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &reports)?;
    writeln!(stdout)?;
    Ok(())
}

/// Write trades in the specified format.
pub(crate) fn write_trades(trades: &[Trade], output: Option<&Path>, format: Format) -> Result<()> {
    let mut writer = open_output(output)?;
    formatter_for(format.into()).write_trades(trades, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write bars in the specified format.
pub(crate) fn write_bars(bars: &[Bar], output: Option<&Path>, format: Format) -> Result<()> {
    let mut writer = open_output(output)?;
    formatter_for(format.into()).write_bars(bars, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Print a download report as one summary line.
pub(crate) fn print_report(report: &DownloadReport) {
    let newest = report
        .newest
        .map_or_else(|| "-".to_string(), time::unix_to_iso);
    eprintln!(
        "{}/{}: {} trades appended in {} pages ({} duplicates, {} out of order), newest {}, {:?}",
        report.exchange,
        report.pair,
        report.appended,
        report.pages,
        report.duplicates,
        report.out_of_order,
        newest,
        report.outcome
    );
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:.bold} [{elapsed_precise}] [{bar:30.cyan/blue}] {percent}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

/// Creates a progress callback drawing one bar per unit.
///
/// Bars track the newest stored timestamp between `start` and the
/// requested end.
pub(crate) fn unit_progress(start: i64, quiet: bool) -> Option<ProgressFn> {
    if quiet {
        return None;
    }
    let multi = MultiProgress::new();
    let bars: Mutex<HashMap<(Exchange, String), ProgressBar>> = Mutex::new(HashMap::new());

    Some(Arc::new(move |p: &PageProgress| {
        let mut bars = bars.lock().unwrap_or_else(PoisonError::into_inner);
        let bar = bars
            .entry((p.exchange, p.pair.clone()))
            .or_insert_with(|| {
                let pb = multi.add(ProgressBar::new(span(start, p.end)));
                pb.set_style(bar_style());
                pb.set_prefix(format!("{:>9} {:<10}", p.exchange, p.pair));
                pb
            });
        if let Some(newest) = p.newest {
            bar.set_position(span(start, newest.min(p.end)));
            bar.set_message(format!("{} trades, at {}", p.total_appended, time::unix_to_iso(newest)));
        }
    }))
}

/// Seconds from `start` to `until`, zero when `until` is earlier.
fn span(start: i64, until: i64) -> u64 {
    u64::try_from(until.saturating_sub(start)).unwrap_or(0)
}
