//! Ingestion coordinator and query API.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use trawl_aggregate::{Bar, aggregate};
use trawl_catalog::PairCatalog;
use trawl_fetch::{
    DownloadReport, HttpTransport, PaginatedDownloader, ProgressFn, RetryingFetcher, Transport,
    adapter_for,
};
use trawl_store::{CsvTickStore, TickStore};
use trawl_types::{Exchange, Interval, TimeRange, Trade};

use crate::{IngestError, Result, TrawlConfig};

/// Transport and tick store serving one exchange.
#[derive(Debug, Clone)]
pub struct Backend {
    /// Performs the exchange's HTTP requests.
    pub transport: Arc<dyn Transport>,
    /// Holds the exchange's trade logs.
    pub store: Arc<dyn TickStore>,
}

/// Result of ingesting one (exchange, pair) unit.
#[derive(Debug)]
pub struct UnitOutcome {
    /// Exchange of the unit.
    pub exchange: Exchange,
    /// Pair of the unit.
    pub pair: String,
    /// Report, or the error that stopped the unit.
    pub result: Result<DownloadReport>,
}

impl UnitOutcome {
    /// Returns true if the unit finished without error.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-unit outcomes of an `ingest_all` run, sorted by exchange and pair.
#[derive(Debug, Default)]
pub struct IngestSummary {
    /// One entry per catalogued unit.
    pub units: Vec<UnitOutcome>,
}

impl IngestSummary {
    /// Reports of the units that finished.
    pub fn succeeded(&self) -> impl Iterator<Item = &DownloadReport> {
        self.units.iter().filter_map(|u| u.result.as_ref().ok())
    }

    /// Units that stopped on an error.
    pub fn failed(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.units.iter().filter(|u| !u.is_ok())
    }

    /// Total trades appended across all units.
    #[must_use]
    pub fn appended(&self) -> usize {
        self.succeeded().map(|r| r.appended).sum()
    }

    /// Returns true if every unit finished.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.units.iter().all(UnitOutcome::is_ok)
    }
}

/// One async mutex per unit, created on first use.
#[derive(Debug, Default)]
struct UnitLocks {
    units: Mutex<HashMap<(Exchange, String), Arc<tokio::sync::Mutex<()>>>>,
}

impl UnitLocks {
    fn get(&self, exchange: Exchange, pair: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut units = self.units.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(units.entry((exchange, pair.to_string())).or_default())
    }
}

/// Drives ingestion for every configured exchange and answers queries
/// from the stored logs.
///
/// Cloning is cheap; clones share downloaders, stores and unit locks.
/// Ingestion of the same unit is serialized, different units run
/// independently.
#[derive(Debug, Clone)]
pub struct IngestionCoordinator {
    config: Arc<TrawlConfig>,
    catalog: Arc<PairCatalog>,
    downloaders: Arc<BTreeMap<Exchange, PaginatedDownloader>>,
    locks: Arc<UnitLocks>,
}

impl IngestionCoordinator {
    /// Creates a coordinator with HTTP transports and CSV stores under
    /// the configured data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the pair catalog cannot be loaded or an HTTP
    /// client cannot be built.
    pub fn new(config: TrawlConfig) -> Result<Self> {
        let catalog = config.catalog()?;
        let mut backends = BTreeMap::new();
        for &exchange in Exchange::all() {
            let adapter = adapter_for(exchange);
            let transport = HttpTransport::new(&config.client_config(adapter.as_ref()))?;
            let extras = adapter
                .extra_columns()
                .iter()
                .map(ToString::to_string)
                .collect();
            let store = CsvTickStore::new(config.store_dir(exchange), extras);
            backends.insert(
                exchange,
                Backend {
                    transport: Arc::new(transport),
                    store: Arc::new(store),
                },
            );
        }
        Ok(Self::from_parts(config, catalog, backends))
    }

    /// Creates a coordinator from explicit backends.
    ///
    /// Exchanges without a backend answer with
    /// [`IngestError::Unavailable`].
    #[must_use]
    pub fn from_parts(
        config: TrawlConfig,
        catalog: PairCatalog,
        backends: BTreeMap<Exchange, Backend>,
    ) -> Self {
        let downloaders = backends
            .into_iter()
            .map(|(exchange, backend)| {
                let fetcher = RetryingFetcher::new(backend.transport, config.retry);
                let downloader =
                    PaginatedDownloader::new(fetcher, adapter_for(exchange), backend.store);
                (exchange, downloader)
            })
            .collect();
        Self {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            downloaders: Arc::new(downloaders),
            locks: Arc::default(),
        }
    }

    /// Sets a callback invoked after every stored page, for all exchanges.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.downloaders = Arc::new(
            self.downloaders
                .iter()
                .map(|(exchange, d)| (*exchange, d.clone().with_progress(Arc::clone(&progress))))
                .collect(),
        );
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &TrawlConfig {
        &self.config
    }

    /// Returns the pair catalog.
    #[must_use]
    pub fn catalog(&self) -> &PairCatalog {
        &self.catalog
    }

    /// Returns the tick store of an exchange.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Unavailable`] if the exchange has no backend.
    pub fn store(&self, exchange: Exchange) -> Result<&Arc<dyn TickStore>> {
        Ok(self.downloader(exchange)?.store())
    }

    fn downloader(&self, exchange: Exchange) -> Result<&PaginatedDownloader> {
        self.downloaders
            .get(&exchange)
            .ok_or(IngestError::Unavailable(exchange))
    }

    /// Brings one unit's stored history up to `end`.
    ///
    /// A unit with nothing stored starts at the first trade at or after
    /// `start`; otherwise the run continues after the last stored trade.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is invalid, the pair is not
    /// catalogued, or downloading fails for good.
    pub async fn ingest(
        &self,
        exchange: Exchange,
        pair: &str,
        start: i64,
        end: i64,
    ) -> Result<DownloadReport> {
        TimeRange::new(start, end)?;
        self.catalog.require(exchange, pair)?;
        let downloader = self.downloader(exchange)?;

        let lock = self.locks.get(exchange, pair);
        let _guard = lock.lock().await;
        debug!(%exchange, pair, start, end, "Ingesting unit");
        Ok(downloader.download(pair, start, end).await?)
    }

    /// Returns stored trades with `start <= timestamp <= end`.
    ///
    /// Reads the store only; nothing is downloaded.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::NotFound`] if nothing was ever stored for
    /// the unit.
    pub async fn get_trades(
        &self,
        exchange: Exchange,
        pair: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<Trade>> {
        TimeRange::new(start, end)?;
        let store = self.store(exchange)?;
        if !store.exists(pair).await? {
            return Err(IngestError::NotFound {
                exchange,
                pair: pair.to_string(),
            });
        }
        Ok(store.range(pair, start, end).await?)
    }

    /// Ingests through `range.end`, then aggregates the stored trades into
    /// bars covering `range`.
    ///
    /// A unit without trades in the range, including one whose history is
    /// empty, yields empty bars.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is invalid or ingestion fails.
    pub async fn get_bars(
        &self,
        exchange: Exchange,
        pair: &str,
        range: TimeRange,
        interval: Interval,
    ) -> Result<Vec<Bar>> {
        let report = self.ingest(exchange, pair, range.start, range.end).await?;
        let trades = self.store(exchange)?.range(pair, range.start, range.end).await?;
        if trades.is_empty() {
            debug!(%exchange, pair, outcome = ?report.outcome, "No trades in range");
        }
        Ok(aggregate(&trades, range, interval)?)
    }

    /// Ingests every catalogued unit with at most `concurrency` running
    /// at once.
    ///
    /// A failing unit does not affect the others; each unit's outcome is
    /// reported in the summary.
    pub async fn ingest_all(&self, start: i64, end: i64, concurrency: usize) -> IngestSummary {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut pending: BTreeSet<(Exchange, String)> = self
            .catalog
            .units()
            .map(|(exchange, pair)| (exchange, pair.to_string()))
            .collect();
        info!(units = pending.len(), concurrency, start, end, "Starting ingestion");

        let mut tasks = JoinSet::new();
        for (exchange, pair) in pending.iter().cloned() {
            let coordinator = self.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return UnitOutcome {
                        result: Err(IngestError::Aborted {
                            exchange,
                            pair: pair.clone(),
                        }),
                        exchange,
                        pair,
                    };
                };
                let result = coordinator.ingest(exchange, &pair, start, end).await;
                UnitOutcome {
                    exchange,
                    pair,
                    result,
                }
            });
        }

        let mut units = Vec::with_capacity(pending.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    pending.remove(&(outcome.exchange, outcome.pair.clone()));
                    if let Err(e) = &outcome.result {
                        warn!(exchange = %outcome.exchange, pair = %outcome.pair, error = %e, "Unit failed");
                    }
                    units.push(outcome);
                }
                Err(e) => error!(error = %e, "Ingestion task did not complete"),
            }
        }
        units.extend(pending.into_iter().map(|(exchange, pair)| UnitOutcome {
            exchange,
            result: Err(IngestError::Aborted {
                exchange,
                pair: pair.clone(),
            }),
            pair,
        }));
        units.sort_by(|a, b| (a.exchange, &a.pair).cmp(&(b.exchange, &b.pair)));

        let summary = IngestSummary { units };
        info!(
            units = summary.units.len(),
            failed = summary.failed().count(),
            appended = summary.appended(),
            "Ingestion finished"
        );
        summary
    }
}
