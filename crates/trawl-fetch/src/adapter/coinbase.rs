//! Coinbase (formerly GDAX).
//!
//! `GET /products/{pair}/trades?after=N&limit=100` returns up to 100
//! trades with `trade_id < N`, newest first. `after` is exclusive, so the
//! page starting at id `n` (inclusive) is requested with `after = n + 100`
//! and filtered to `[n, n + 100)`.

use serde_json::Value;
use trawl_types::{Cursor, Exchange, Trade};

use super::{CursorStrategy, ExchangeAdapter, Page, ParseError};
use super::{array, field, integer, number, side, text, timestamp};
use crate::Request;

const LIMIT: u64 = 100;

/// Largest id the API accepts for `after`; returns the newest trades.
const MAX_TRADE_ID: u64 = 2_147_483_647;

/// Coinbase Exchange adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Coinbase;

impl Coinbase {
    fn trades_request(pair: &str, after: u64) -> Request {
        Request::new(format!("/products/{pair}/trades"))
            .param("after", after)
            .param("limit", LIMIT)
    }
}

impl ExchangeAdapter for Coinbase {
    fn exchange(&self) -> Exchange {
        Exchange::Coinbase
    }

    fn default_base_url(&self) -> &'static str {
        "https://api.exchange.coinbase.com"
    }

    fn page_limit(&self) -> usize {
        LIMIT as usize
    }

    fn cursor_strategy(&self) -> CursorStrategy {
        CursorStrategy::BinarySearch
    }

    fn earliest_cursor(&self) -> Cursor {
        Cursor::Sequence(1)
    }

    fn build_page_request(&self, pair: &str, cursor: &Cursor) -> Request {
        let first = cursor.sequence().unwrap_or(1);
        Self::trades_request(pair, first.saturating_add(LIMIT).min(MAX_TRADE_ID))
    }

    fn parse_trades(&self, pair: &str, body: &Value) -> Result<Vec<Trade>, ParseError> {
        let ex = self.exchange();
        let rows = array(ex, body, "trades")?;
        let mut trades = rows
            .iter()
            .map(|row| {
                Ok(Trade::new(
                    pair,
                    Some(integer(ex, field(ex, row, "trade_id")?, "trade_id")?),
                    timestamp(ex, text(ex, field(ex, row, "time")?, "time")?)?,
                    number(ex, field(ex, row, "price")?, "price")?,
                    number(ex, field(ex, row, "size")?, "size")?,
                    side(ex, text(ex, field(ex, row, "side")?, "side")?)?,
                ))
            })
            .collect::<Result<Vec<_>, ParseError>>()?;
        // newest first on the wire
        trades.reverse();
        Ok(trades)
    }

    fn parse_page(&self, pair: &str, cursor: &Cursor, body: &Value) -> Result<Page, ParseError> {
        let trades = self.parse_trades(pair, body)?;
        let raw_len = trades.len();
        let first = cursor.sequence().unwrap_or(1);
        let last = first.saturating_add(LIMIT);
        Ok(Page {
            trades: trades
                .into_iter()
                .filter(|t| t.sequence.is_some_and(|s| s >= first && s < last))
                .collect(),
            raw_len,
            continuation: None,
        })
    }

    fn page_is_final(&self, _cursor: &Cursor, page: &Page) -> bool {
        // Past the newest id the API still answers with the latest trades.
        // Used only when the newest id could not be read up front.
        page.trades.len() < self.page_limit()
    }

    fn ids_have_gaps(&self) -> bool {
        true
    }

    fn next_cursor(&self, cursor: &Cursor, page: &Page) -> Cursor {
        let first = cursor.sequence().unwrap_or(1);
        match page.last().and_then(|t| t.sequence) {
            Some(seq) => Cursor::Sequence(seq + 1),
            None => Cursor::Sequence(first.saturating_add(LIMIT)),
        }
    }

    fn latest_request(&self, pair: &str) -> Option<Request> {
        Some(Self::trades_request(pair, MAX_TRADE_ID))
    }

    fn api_error(&self, body: &Value) -> Option<String> {
        body.get("message")
            .or_else(|| body.get("error"))
            .map(super::passthrough)
    }
}
