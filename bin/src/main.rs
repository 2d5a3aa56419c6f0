//! trawl CLI - resumable crypto trade-tick ingester.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use trawl_lib::prelude::*;

mod commands;
mod display;

use display::Format;

#[derive(Parser)]
#[command(name = "trawl")]
#[command(about = "Resumable crypto exchange trade-tick ingester", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Storage directory (overrides the configuration)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress progress output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest one pair's trades into the local store
    Ingest {
        /// Exchange (coinbase, kraken, binance, bitmex, poloniex)
        exchange: Exchange,

        /// Pair as listed by the exchange (e.g., BTC-USD, XXBTZUSD)
        pair: String,

        /// Start time for a pair with nothing stored. Defaults to the earliest trade.
        #[arg(short, long)]
        start: Option<String>,

        /// End time. Defaults to now.
        #[arg(short, long)]
        end: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ingest every catalogued pair
    IngestAll {
        /// Start time for pairs with nothing stored. Defaults to the earliest trade.
        #[arg(short, long)]
        start: Option<String>,

        /// End time. Defaults to now.
        #[arg(short, long)]
        end: Option<String>,

        /// Pairs ingested at once. Defaults to the configured concurrency.
        #[arg(long)]
        concurrency: Option<usize>,

        /// Print the reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print stored trades
    Trades {
        /// Exchange
        exchange: Exchange,

        /// Pair
        pair: String,

        /// Start time (inclusive). Defaults to the beginning of the log.
        #[arg(short, long)]
        start: Option<String>,

        /// End time (inclusive). Defaults to now.
        #[arg(short, long)]
        end: Option<String>,

        /// Output file path. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "csv")]
        format: Format,
    },

    /// Ingest, then print OHLCV bars
    Bars {
        /// Exchange
        exchange: Exchange,

        /// Pair
        pair: String,

        /// Start time (exclusive left edge of the first bar)
        #[arg(short, long)]
        start: String,

        /// End time (inclusive). Defaults to now.
        #[arg(short, long)]
        end: Option<String>,

        /// Bar width (e.g., 60, 90s, 1m, 15m, 1h, 1d)
        #[arg(short, long, default_value = "1m")]
        interval: Interval,

        /// Output file path. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "csv")]
        format: Format,
    },

    /// List catalogued pairs
    Pairs {
        /// Only this exchange
        #[arg(short, long)]
        exchange: Option<Exchange>,

        /// Search pattern
        #[arg(short, long)]
        search: Option<String>,
    },
}

/// Installs the log subscriber; `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    // Show help if no command provided
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = commands::load_config(cli.config.as_deref(), cli.data_dir)?;

    match command {
        Commands::Ingest {
            exchange,
            pair,
            start,
            end,
            json,
        } => {
            commands::ingest::ingest(
                config,
                exchange,
                &pair,
                start.as_deref(),
                end.as_deref(),
                json,
                cli.quiet,
            )
            .await
        }
        Commands::IngestAll {
            start,
            end,
            concurrency,
            json,
        } => {
            commands::ingest_all::ingest_all(
                config,
                start.as_deref(),
                end.as_deref(),
                concurrency,
                json,
                cli.quiet,
            )
            .await
        }
        Commands::Trades {
            exchange,
            pair,
            start,
            end,
            output,
            format,
        } => {
            commands::query::trades(
                config,
                exchange,
                &pair,
                start.as_deref(),
                end.as_deref(),
                output,
                format,
            )
            .await
        }
        Commands::Bars {
            exchange,
            pair,
            start,
            end,
            interval,
            output,
            format,
        } => {
            commands::query::bars(
                config,
                exchange,
                &pair,
                &start,
                end.as_deref(),
                interval,
                output,
                format,
                cli.quiet,
            )
            .await
        }
        Commands::Pairs { exchange, search } => {
            commands::pairs::list_pairs(&config, exchange, search.as_deref())
        }
    }
}
