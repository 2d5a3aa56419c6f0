//! Start-cursor resolution.

use tracing::debug;
use trawl_types::{Cursor, Trade};

use crate::{CursorStrategy, ExchangeAdapter, FetchError, Page, RetryingFetcher};

/// Result of resolving a start time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Paging from this cursor yields the first trade at or after the start.
    Found(Cursor),
    /// The pair has no trade at or after the start.
    Empty,
}

/// Maps a start time to the first cursor whose page holds trades at or
/// after it.
///
/// Exchanges differ in how much help they give: some page by time
/// directly, some offer a time lookup, and some only expose sequence ids
/// or row offsets that have to be searched. The strategy is chosen by the
/// adapter's [`cursor_strategy`](ExchangeAdapter::cursor_strategy).
#[derive(Debug, Clone, Copy)]
pub struct CursorResolver<'a> {
    fetcher: &'a RetryingFetcher,
    adapter: &'a dyn ExchangeAdapter,
}

impl<'a> CursorResolver<'a> {
    /// Creates a resolver.
    #[must_use]
    pub const fn new(fetcher: &'a RetryingFetcher, adapter: &'a dyn ExchangeAdapter) -> Self {
        Self { fetcher, adapter }
    }

    /// Resolves the first cursor at or after `start`.
    ///
    /// # Errors
    ///
    /// Returns an error only if a probe request fails for good or its
    /// response cannot be parsed. A pair without trades resolves to
    /// [`Resolution::Empty`].
    pub async fn resolve_start_cursor(
        &self,
        pair: &str,
        start: i64,
    ) -> Result<Resolution, FetchError> {
        let strategy = self.adapter.cursor_strategy();
        let resolution = match strategy {
            CursorStrategy::Direct => Resolution::Found(Cursor::Time(start)),
            CursorStrategy::TimeNative => self.time_native(pair, start).await?,
            CursorStrategy::BinarySearch => self.binary_search(pair, start).await?,
            CursorStrategy::Probe => self.probe(pair, start).await?,
        };
        debug!(
            exchange = %self.adapter.exchange(),
            pair,
            start,
            ?strategy,
            ?resolution,
            "resolved start cursor"
        );
        Ok(resolution)
    }

    async fn page(&self, pair: &str, cursor: &Cursor) -> Result<Page, FetchError> {
        let request = self.adapter.build_page_request(pair, cursor);
        let body = self.fetcher.fetch(self.adapter, &request).await?;
        Ok(self.adapter.parse_page(pair, cursor, &body)?)
    }

    /// Fetches the most recent trade, if the exchange can report it.
    pub(crate) async fn latest(&self, pair: &str) -> Result<Option<Trade>, FetchError> {
        let Some(request) = self.adapter.latest_request(pair) else {
            return Ok(None);
        };
        let body = self.fetcher.fetch(self.adapter, &request).await?;
        Ok(self.adapter.parse_latest(pair, &body)?)
    }

    /// Probes the first page of history; returns a resolution if that
    /// page alone settles it.
    async fn earliest(&self, pair: &str, start: i64) -> Result<Option<Resolution>, FetchError> {
        let cursor = self.adapter.earliest_cursor();
        let page = self.page(pair, &cursor).await?;
        let (Some(first), Some(last)) = (page.first(), page.last()) else {
            return Ok(Some(Resolution::Empty));
        };
        if first.timestamp >= start {
            return Ok(Some(Resolution::Found(cursor)));
        }
        if last.timestamp >= start {
            return Ok(first_at_or_after(&page, start).map(Resolution::Found));
        }
        Ok(None)
    }

    async fn time_native(&self, pair: &str, start: i64) -> Result<Resolution, FetchError> {
        if let Some(resolution) = self.earliest(pair, start).await? {
            return Ok(resolution);
        }
        if self.adapter.time_lookup_request(pair, start, start).is_none() {
            return Ok(Resolution::Found(Cursor::Time(start)));
        }
        let Some(latest) = self.latest(pair).await? else {
            return Ok(Resolution::Empty);
        };
        if latest.timestamp < start {
            return Ok(Resolution::Empty);
        }

        let window = self.adapter.time_lookup_window().max(1);
        let mut from = start;
        while from <= latest.timestamp {
            let to = from.saturating_add(window - 1);
            let Some(request) = self.adapter.time_lookup_request(pair, from, to) else {
                break;
            };
            let body = self.fetcher.fetch(self.adapter, &request).await?;
            if let Some(first) = self.adapter.parse_trades(pair, &body)?.first() {
                return Ok(Resolution::Found(cursor_at(first)));
            }
            from = to.saturating_add(1);
        }
        Ok(Resolution::Empty)
    }

    async fn binary_search(&self, pair: &str, start: i64) -> Result<Resolution, FetchError> {
        if let Some(resolution) = self.earliest(pair, start).await? {
            return Ok(resolution);
        }
        let Some(latest) = self.latest(pair).await? else {
            return Ok(Resolution::Empty);
        };
        if latest.timestamp < start {
            return Ok(Resolution::Empty);
        }
        let Some(mut hi) = latest.sequence else {
            return Ok(Resolution::Found(self.adapter.earliest_cursor()));
        };

        let mut lo = self.adapter.earliest_cursor().sequence().unwrap_or(0);
        let mut candidate = hi;
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let page = self.page(pair, &Cursor::Sequence(mid)).await?;
            debug!(pair, lo, mid, hi, trades = page.trades.len(), "bisecting");
            let (Some(first), Some(last)) = (page.first(), page.last()) else {
                // gaps wider than a page are treated as lying past the boundary
                if mid == 0 {
                    break;
                }
                hi = mid - 1;
                continue;
            };
            if first.timestamp >= start {
                candidate = candidate.min(first.sequence.unwrap_or(mid));
                if mid == 0 {
                    break;
                }
                hi = mid - 1;
            } else if last.timestamp < start {
                lo = last.sequence.unwrap_or(mid).saturating_add(1);
            } else {
                return Ok(Resolution::Found(
                    first_at_or_after(&page, start).unwrap_or(Cursor::Sequence(mid)),
                ));
            }
        }
        Ok(Resolution::Found(Cursor::Sequence(candidate)))
    }

    async fn probe(&self, pair: &str, start: i64) -> Result<Resolution, FetchError> {
        if let Some(resolution) = self.earliest(pair, start).await? {
            return Ok(resolution);
        }
        if let Some(latest) = self.latest(pair).await?
            && latest.timestamp < start
        {
            return Ok(Resolution::Empty);
        }

        let limit = self.adapter.page_limit().max(1) as u64;
        // the page at `lo` always starts before `start`
        let mut lo = self.adapter.earliest_cursor().sequence().unwrap_or(0);
        let mut step = limit;
        loop {
            let at = lo.saturating_add(step);
            let page = self.page(pair, &Cursor::Sequence(at)).await?;
            debug!(pair, lo, at, step, trades = page.trades.len(), "probing");

            let overshoot = page.first().is_none_or(|first| first.timestamp >= start);
            if overshoot {
                if step > limit {
                    step /= 2;
                    continue;
                }
                let page = self.page(pair, &Cursor::Sequence(lo)).await?;
                return Ok(Resolution::Found(first_at_or_after(&page, start).unwrap_or(
                    Cursor::Sequence(lo.saturating_add(page.trades.len() as u64)),
                )));
            }
            if page.last().is_some_and(|last| last.timestamp >= start)
                && let Some(cursor) = first_at_or_after(&page, start)
            {
                return Ok(Resolution::Found(cursor));
            }
            if page.trades.len() < limit as usize {
                return Ok(Resolution::Found(Cursor::Sequence(
                    at.saturating_add(page.trades.len() as u64),
                )));
            }
            lo = at;
            step = step.saturating_mul(2);
        }
    }
}

/// Cursor that starts paging at `trade`.
fn cursor_at(trade: &Trade) -> Cursor {
    trade
        .sequence
        .map_or(Cursor::Time(trade.timestamp), Cursor::Sequence)
}

fn first_at_or_after(page: &Page, start: i64) -> Option<Cursor> {
    page.trades
        .iter()
        .find(|t| t.timestamp >= start)
        .map(cursor_at)
}
