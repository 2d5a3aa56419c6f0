//! Resumable paginated download into a tick store.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, trace, warn};
use trawl_store::{StoreError, TickStore};
use trawl_types::{Cursor, Exchange, Trade};

use crate::{CursorResolver, ExchangeAdapter, FetchError, Page, Resolution, RetryingFetcher};

/// Errors that abort a download.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// A page could not be fetched or parsed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A page could not be persisted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Phase of a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    /// Not started.
    Idle,
    /// Looking for the first cursor at or after the start time.
    ResolvingCursor,
    /// Waiting for a page.
    FetchingPage,
    /// Appending a page to the store.
    Persisting,
    /// Finished.
    Done,
}

impl std::fmt::Display for DownloadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::ResolvingCursor => "resolving_cursor",
            Self::FetchingPage => "fetching_page",
            Self::Persisting => "persisting",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// Why a download stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadOutcome {
    /// The exchange has no further pages.
    Completed,
    /// Stored history reached the requested end.
    ReachedEnd,
    /// A page brought nothing new and the cursor did not move.
    Stalled,
    /// The pair has no trades at or after the start.
    EmptyHistory,
    /// The store already covered the requested end.
    AlreadyCurrent,
}

/// Summary of one download run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadReport {
    /// Exchange downloaded from.
    pub exchange: Exchange,
    /// Pair downloaded.
    pub pair: String,
    /// Pages fetched, excluding resolver probes.
    pub pages: usize,
    /// Trades appended to the store.
    pub appended: usize,
    /// Re-delivered trades dropped.
    pub duplicates: usize,
    /// Trades dropped for arriving out of order.
    pub out_of_order: usize,
    /// Newest stored timestamp when the run ended.
    pub newest: Option<i64>,
    /// Why the run stopped.
    pub outcome: DownloadOutcome,
}

/// Progress after each persisted page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageProgress {
    /// Exchange being downloaded.
    pub exchange: Exchange,
    /// Pair being downloaded.
    pub pair: String,
    /// Pages fetched so far.
    pub pages: usize,
    /// Trades appended from this page.
    pub appended: usize,
    /// Trades appended so far.
    pub total_appended: usize,
    /// Newest stored timestamp.
    pub newest: Option<i64>,
    /// Requested end.
    pub end: i64,
}

/// Callback invoked after every page.
pub type ProgressFn = Arc<dyn Fn(&PageProgress) + Send + Sync>;

/// Pages one pair's history into a [`TickStore`].
///
/// A run resumes after the last stored trade, or resolves a start cursor
/// when nothing is stored yet, then fetches and appends one page at a time
/// until the exchange runs out of pages or the stored history reaches the
/// requested end. Each page is appended in a single call, so an aborted run
/// leaves only whole pages behind and the next run picks up from there.
#[derive(Clone)]
pub struct PaginatedDownloader {
    fetcher: RetryingFetcher,
    adapter: Arc<dyn ExchangeAdapter>,
    store: Arc<dyn TickStore>,
    progress: Option<ProgressFn>,
}

impl std::fmt::Debug for PaginatedDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginatedDownloader")
            .field("exchange", &self.adapter.exchange())
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl PaginatedDownloader {
    /// Creates a downloader.
    #[must_use]
    pub fn new(
        fetcher: RetryingFetcher,
        adapter: Arc<dyn ExchangeAdapter>,
        store: Arc<dyn TickStore>,
    ) -> Self {
        Self {
            fetcher,
            adapter,
            store,
            progress: None,
        }
    }

    /// Sets a callback invoked after every page.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Returns the adapter.
    #[must_use]
    pub fn adapter(&self) -> &dyn ExchangeAdapter {
        self.adapter.as_ref()
    }

    /// Returns the store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TickStore> {
        &self.store
    }

    /// Downloads `pair` until its stored history reaches `end`.
    ///
    /// `start` only matters for a pair with nothing stored yet; otherwise
    /// the run continues after the last stored trade.
    ///
    /// # Errors
    ///
    /// Returns an error if a page fails for good or cannot be stored.
    /// Pages appended before the failure stay in the store.
    pub async fn download(
        &self,
        pair: &str,
        start: i64,
        end: i64,
    ) -> Result<DownloadReport, DownloadError> {
        let exchange = self.adapter.exchange();
        let mut state = DownloadState::Idle;
        let mut report = DownloadReport {
            exchange,
            pair: pair.to_string(),
            pages: 0,
            appended: 0,
            duplicates: 0,
            out_of_order: 0,
            newest: None,
            outcome: DownloadOutcome::Completed,
        };

        let stored = self.store.last_run(pair).await?;
        let mut cursor = if let Some(last) = stored.last() {
            report.newest = Some(last.timestamp);
            if last.timestamp >= end {
                return Ok(finish(&mut state, report, DownloadOutcome::AlreadyCurrent));
            }
            let cursor = self.adapter.resume_cursor(last);
            debug!(%exchange, pair, %cursor, newest = last.timestamp, "resuming");
            cursor
        } else {
            transition(&mut state, DownloadState::ResolvingCursor, pair);
            let resolver = CursorResolver::new(&self.fetcher, self.adapter.as_ref());
            match resolver.resolve_start_cursor(pair, start).await? {
                Resolution::Found(cursor) => cursor,
                Resolution::Empty => {
                    return Ok(finish(&mut state, report, DownloadOutcome::EmptyHistory));
                }
            }
        };
        let horizon = self.horizon(pair).await?;
        let mut frontier = Frontier::new(stored);

        loop {
            transition(&mut state, DownloadState::FetchingPage, pair);
            let page = self.fetch_page(pair, &cursor).await?;
            report.pages += 1;

            let fresh = frontier.admit(pair, &page.trades, &mut report);
            if let Some(newest) = fresh.last() {
                transition(&mut state, DownloadState::Persisting, pair);
                self.store.append(pair, &fresh).await?;
                report.appended += fresh.len();
                report.newest = Some(newest.timestamp);
            }
            trace!(
                %exchange,
                pair,
                %cursor,
                received = page.trades.len(),
                appended = fresh.len(),
                "page done"
            );
            if let Some(progress) = &self.progress {
                progress(&PageProgress {
                    exchange,
                    pair: pair.to_string(),
                    pages: report.pages,
                    appended: fresh.len(),
                    total_appended: report.appended,
                    newest: report.newest,
                    end,
                });
            }

            let next = self.adapter.next_cursor(&cursor, &page);
            let exhausted = match horizon {
                Some(newest_id) => next.sequence().is_some_and(|s| s > newest_id),
                None => self.adapter.page_is_final(&cursor, &page),
            };
            let outcome = if exhausted {
                Some(DownloadOutcome::Completed)
            } else if report.newest.is_some_and(|t| t >= end)
                || next.time_hint().is_some_and(|t| t > end)
            {
                Some(DownloadOutcome::ReachedEnd)
            } else if fresh.is_empty() && next == cursor {
                warn!(%exchange, pair, %cursor, "cursor did not advance, stopping");
                Some(DownloadOutcome::Stalled)
            } else {
                None
            };
            if let Some(outcome) = outcome {
                return Ok(finish(&mut state, report, outcome));
            }
            cursor = next;
        }
    }

    async fn fetch_page(&self, pair: &str, cursor: &Cursor) -> Result<Page, FetchError> {
        let request = self.adapter.build_page_request(pair, cursor);
        let body = self.fetcher.fetch(self.adapter.as_ref(), &request).await?;
        Ok(self.adapter.parse_page(pair, cursor, &body)?)
    }

    /// Newest sequence id at the start of the run, for exchanges whose ids
    /// can skip.
    async fn horizon(&self, pair: &str) -> Result<Option<u64>, FetchError> {
        if !self.adapter.ids_have_gaps() {
            return Ok(None);
        }
        let resolver = CursorResolver::new(&self.fetcher, self.adapter.as_ref());
        let newest_id = resolver.latest(pair).await?.and_then(|t| t.sequence);
        debug!(exchange = %self.adapter.exchange(), pair, ?newest_id, "captured horizon");
        Ok(newest_id)
    }
}

fn finish(
    state: &mut DownloadState,
    mut report: DownloadReport,
    outcome: DownloadOutcome,
) -> DownloadReport {
    transition(state, DownloadState::Done, &report.pair);
    report.outcome = outcome;
    info!(
        exchange = %report.exchange,
        pair = %report.pair,
        pages = report.pages,
        appended = report.appended,
        duplicates = report.duplicates,
        out_of_order = report.out_of_order,
        newest = ?report.newest,
        ?outcome,
        "download finished"
    );
    report
}

fn transition(state: &mut DownloadState, next: DownloadState, pair: &str) {
    if *state != next {
        trace!(pair, from = %state, to = %next, "state");
        *state = next;
    }
}

/// Tracks the newest persisted trade and decides which page trades are new.
///
/// Trades at or before the frontier are re-deliveries while they lead a
/// page; once a page has produced something new, anything behind the
/// frontier is out of order. Without sequence ids, trades sharing the
/// frontier's timestamp are matched by payload against the trailing run
/// of stored trades with that timestamp.
#[derive(Debug)]
struct Frontier {
    run: Vec<Trade>,
}

impl Frontier {
    fn new(run: Vec<Trade>) -> Self {
        Self { run }
    }

    fn admit(&mut self, pair: &str, trades: &[Trade], report: &mut DownloadReport) -> Vec<Trade> {
        let mut fresh: Vec<Trade> = Vec::new();
        let mut unmatched = self.run.clone();

        for trade in trades {
            let verdict = match self.run.last() {
                None => Verdict::New,
                Some(last) => match (last.sequence, trade.sequence) {
                    (Some(a), Some(b)) if b <= a => Verdict::Behind,
                    (Some(_), Some(_)) if trade.timestamp < last.timestamp => Verdict::Behind,
                    (Some(_), Some(_)) => Verdict::New,
                    _ if trade.timestamp < last.timestamp => Verdict::Behind,
                    _ if trade.timestamp > last.timestamp => Verdict::New,
                    _ => match unmatched.iter().position(|t| t.same_payload(trade)) {
                        Some(i) => {
                            unmatched.swap_remove(i);
                            Verdict::Duplicate
                        }
                        None => Verdict::New,
                    },
                },
            };

            match verdict {
                Verdict::New => {
                    if self.run.last().is_some_and(|l| l.timestamp != trade.timestamp) {
                        self.run.clear();
                    }
                    self.run.push(trade.clone());
                    fresh.push(trade.clone());
                }
                Verdict::Duplicate => report.duplicates += 1,
                Verdict::Behind if fresh.is_empty() => report.duplicates += 1,
                Verdict::Behind => {
                    warn!(
                        pair,
                        sequence = ?trade.sequence,
                        timestamp = trade.timestamp,
                        "dropping out-of-order trade"
                    );
                    report.out_of_order += 1;
                }
            }
        }
        fresh
    }
}

#[derive(Debug)]
enum Verdict {
    New,
    Duplicate,
    Behind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Market, history};
    use crate::{RetryPolicy, adapter_for};
    use std::sync::Mutex;
    use trawl_store::MemoryTickStore;
    use trawl_types::Side;

    fn downloader(
        exchange: Exchange,
        market: &Market,
        store: &Arc<MemoryTickStore>,
    ) -> PaginatedDownloader {
        let store: Arc<dyn TickStore> = store.clone();
        PaginatedDownloader::new(
            RetryingFetcher::new(market.transport(exchange), RetryPolicy::immediate(3)),
            adapter_for(exchange),
            store,
        )
    }

    fn ids(trades: &[Trade]) -> Vec<u64> {
        trades.iter().filter_map(|t| t.sequence).collect()
    }

    #[tokio::test]
    async fn test_full_history_download() {
        let market = Market::new(history("BTC-USD", 250, 10_000, 10));
        let store = Arc::new(MemoryTickStore::new());

        let report = downloader(Exchange::Coinbase, &market, &store)
            .download("BTC-USD", 0, 1_000_000)
            .await
            .unwrap();

        assert_eq!(report.outcome, DownloadOutcome::Completed);
        assert_eq!(report.appended, 250);
        assert_eq!(report.duplicates, 0);
        assert_eq!(report.newest, Some(12_490));
        assert_eq!(ids(&store.snapshot("BTC-USD").await), (1..=250).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_second_run_appends_nothing() {
        let market = Market::new(history("ETHBTC", 1200, 10_000, 1));
        let store = Arc::new(MemoryTickStore::new());
        let dl = downloader(Exchange::Binance, &market, &store);

        dl.download("ETHBTC", 0, 1_000_000).await.unwrap();
        let report = dl.download("ETHBTC", 0, 1_000_000).await.unwrap();

        assert_eq!(report.appended, 0);
        assert_eq!(report.outcome, DownloadOutcome::Completed);
        assert_eq!(store.len("ETHBTC").await.unwrap(), 1200);
    }

    #[tokio::test]
    async fn test_resume_picks_up_new_trades() {
        let market = Market::new(history("XBTUSD", 700, 10_000, 1));
        let store = Arc::new(MemoryTickStore::new());
        let dl = downloader(Exchange::Bitmex, &market, &store);
        dl.download("XBTUSD", 0, 1_000_000).await.unwrap();

        market.extend(
            history("XBTUSD", 1000, 10_000, 1)
                .into_iter()
                .skip(700)
                .collect(),
        );
        let report = dl.download("XBTUSD", 0, 1_000_000).await.unwrap();

        assert_eq!(report.appended, 300);
        let stored = store.snapshot("XBTUSD").await;
        assert_eq!(ids(&stored), (0..1000).collect::<Vec<_>>());
        assert!(stored.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_start_mid_history() {
        let market = Market::new(history("ETHBTC", 2000, 10_000, 1));
        let store = Arc::new(MemoryTickStore::new());

        let report = downloader(Exchange::Binance, &market, &store)
            .download("ETHBTC", 11_000, 1_000_000)
            .await
            .unwrap();

        let stored = store.snapshot("ETHBTC").await;
        assert_eq!(report.appended, 1000);
        assert_eq!(stored[0].timestamp, 11_000);
        assert_eq!(stored[0].sequence, Some(1001));
    }

    #[tokio::test]
    async fn test_stops_once_end_is_reached() {
        let market = Market::new(history("BTC-USD", 1000, 10_000, 1));
        let store = Arc::new(MemoryTickStore::new());

        let report = downloader(Exchange::Coinbase, &market, &store)
            .download("BTC-USD", 0, 10_250)
            .await
            .unwrap();

        assert_eq!(report.outcome, DownloadOutcome::ReachedEnd);
        // whole pages are kept, the last one crossing the end
        assert_eq!(report.appended, 300);
        assert_eq!(report.pages, 3);

        let again = downloader(Exchange::Coinbase, &market, &store)
            .download("BTC-USD", 0, 10_250)
            .await
            .unwrap();
        assert_eq!(again.outcome, DownloadOutcome::AlreadyCurrent);
        assert_eq!(again.pages, 0);
    }

    #[tokio::test]
    async fn test_sequenceless_resume_skips_stored_run() {
        // five trades per second, no ids on the wire
        let trades: Vec<Trade> = (0..50)
            .map(|i| Trade::new("XXBTZUSD", None, 10_000 + i / 5, 100.0 + i as f64, 1.0, Side::Buy))
            .collect();
        let market = Market::new(trades.clone());
        let store = Arc::new(MemoryTickStore::new());
        let kraken_row = |t: &Trade| t.clone().with_extra("order_type", "l");
        // stored history ends two trades into the second 10_004
        let stored: Vec<Trade> = trades[..22].iter().map(kraken_row).collect();
        store.append("XXBTZUSD", &stored).await.unwrap();

        let report = downloader(Exchange::Kraken, &market, &store)
            .download("XXBTZUSD", 0, 1_000_000)
            .await
            .unwrap();

        assert_eq!(report.duplicates, 2);
        assert_eq!(report.appended, 28);
        let all = store.snapshot("XXBTZUSD").await;
        let expected: Vec<Trade> = trades.iter().map(kraken_row).collect();
        assert_eq!(all, expected);
    }

    #[tokio::test]
    async fn test_failure_keeps_whole_pages_and_resumes() {
        let market = Market::new(history("BTC-USD", 450, 10_000, 1));
        let store = Arc::new(MemoryTickStore::new());
        let dl = downloader(Exchange::Coinbase, &market, &store);

        // one resolver probe, the horizon and two pages, then the exchange goes away
        market.outage_after(4);
        let err = dl.download("BTC-USD", 0, 1_000_000).await.unwrap_err();
        assert!(matches!(
            err,
            DownloadError::Fetch(FetchError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(store.len("BTC-USD").await.unwrap(), 200);

        market.restore();
        let report = dl.download("BTC-USD", 0, 1_000_000).await.unwrap();
        assert_eq!(report.appended, 250);
        assert_eq!(ids(&store.snapshot("BTC-USD").await), (1..=450).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_id_gap_does_not_end_the_run() {
        let mut trades = history("BTC-USD", 300, 10_000, 1);
        trades.retain(|t| t.sequence != Some(150));
        let market = Market::new(trades);
        let store = Arc::new(MemoryTickStore::new());

        let report = downloader(Exchange::Coinbase, &market, &store)
            .download("BTC-USD", 0, 1_000_000)
            .await
            .unwrap();

        assert_eq!(report.outcome, DownloadOutcome::Completed);
        assert_eq!(report.appended, 299);
        let stored = ids(&store.snapshot("BTC-USD").await);
        assert_eq!(stored.len(), 299);
        assert_eq!(stored.last(), Some(&300));
        assert!(!stored.contains(&150));
    }

    #[tokio::test]
    async fn test_trades_after_horizon_wait_for_next_run() {
        let market = Market::new(history("BTC-USD", 120, 10_000, 1));
        let store = Arc::new(MemoryTickStore::new());
        let dl = downloader(Exchange::Coinbase, &market, &store);
        dl.download("BTC-USD", 0, 1_000_000).await.unwrap();

        market.extend(
            history("BTC-USD", 180, 10_000, 1)
                .into_iter()
                .skip(120)
                .collect(),
        );
        let report = dl.download("BTC-USD", 0, 1_000_000).await.unwrap();
        assert_eq!(report.outcome, DownloadOutcome::Completed);
        assert_eq!(report.appended, 60);
        assert_eq!(ids(&store.snapshot("BTC-USD").await), (1..=180).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_empty_history() {
        let market = Market::new(Vec::new());
        let store = Arc::new(MemoryTickStore::new());

        let report = downloader(Exchange::Bitmex, &market, &store)
            .download("XBTUSD", 0, 1_000_000)
            .await
            .unwrap();

        assert_eq!(report.outcome, DownloadOutcome::EmptyHistory);
        assert!(!store.exists("XBTUSD").await.unwrap());
    }

    #[tokio::test]
    async fn test_stalled_cursor_stops() {
        use crate::FnTransport;
        use serde_json::json;

        // a full page whose continuation token never moves
        let rows: Vec<_> = (0..1000)
            .map(|i| json!(["1.0", "1.0", 10_000 + i / 10, "b", "l", ""]))
            .collect();
        let body = json!({ "error": [], "result": { "XXBTZUSD": rows, "last": "5" } });
        let transport = Arc::new(FnTransport::new(move |_req: &crate::Request| Ok(body.clone())));
        let store = Arc::new(MemoryTickStore::new());
        let dl = PaginatedDownloader::new(
            RetryingFetcher::new(transport, RetryPolicy::immediate(1)),
            adapter_for(Exchange::Kraken),
            store.clone(),
        );

        let report = dl.download("XXBTZUSD", 0, 1_000_000).await.unwrap();
        assert_eq!(report.outcome, DownloadOutcome::Stalled);
        assert_eq!(report.appended, 1000);
        assert_eq!(report.duplicates, 1000);
        assert_eq!(report.pages, 2);
    }

    #[test]
    fn test_out_of_order_trades_are_dropped() {
        let run = vec![Trade::new("p", Some(5), 100, 1.0, 1.0, Side::Buy)];
        let mut frontier = Frontier::new(run);
        let mut report = DownloadReport {
            exchange: Exchange::Binance,
            pair: "p".into(),
            pages: 0,
            appended: 0,
            duplicates: 0,
            out_of_order: 0,
            newest: None,
            outcome: DownloadOutcome::Completed,
        };
        let page = [
            Trade::new("p", Some(4), 99, 1.0, 1.0, Side::Buy),
            Trade::new("p", Some(6), 101, 1.0, 1.0, Side::Buy),
            Trade::new("p", Some(7), 100, 1.0, 1.0, Side::Buy),
            Trade::new("p", Some(6), 102, 1.0, 1.0, Side::Buy),
            Trade::new("p", Some(8), 102, 1.0, 1.0, Side::Buy),
        ];

        let fresh = frontier.admit("p", &page, &mut report);
        assert_eq!(ids(&fresh), vec![6, 8]);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.out_of_order, 2);
    }

    #[tokio::test]
    async fn test_progress_is_reported_per_page() {
        let market = Market::new(history("BTC-USD", 250, 10_000, 1));
        let store = Arc::new(MemoryTickStore::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        downloader(Exchange::Coinbase, &market, &store)
            .with_progress(Arc::new(move |p: &PageProgress| {
                sink.lock().unwrap().push(p.total_appended);
            }))
            .download("BTC-USD", 0, 1_000_000)
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![100, 200, 250]);
    }
}
