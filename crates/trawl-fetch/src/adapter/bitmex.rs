//! BitMEX.
//!
//! `GET /trade?symbol=S&start=N&count=500` returns rows `N..N+500` of the
//! symbol's trade history (row offset, inclusive), oldest first. Rows have
//! no numeric id, so the row offset becomes the trade's sequence.

use serde_json::Value;
use trawl_types::{Cursor, Exchange, Trade};

use super::{CursorStrategy, ExchangeAdapter, Page, ParseError};
use super::{array, field, number, passthrough, side, text, timestamp};
use crate::Request;

const LIMIT: usize = 500;

const EXTRA_COLUMNS: [&str; 5] = [
    "tickDirection",
    "grossValue",
    "homeNotional",
    "foreignNotional",
    "trdMatchID",
];

/// BitMEX adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bitmex;

impl ExchangeAdapter for Bitmex {
    fn exchange(&self) -> Exchange {
        Exchange::Bitmex
    }

    fn default_base_url(&self) -> &'static str {
        "https://www.bitmex.com/api/v1"
    }

    fn page_limit(&self) -> usize {
        LIMIT
    }

    fn extra_columns(&self) -> &'static [&'static str] {
        &EXTRA_COLUMNS
    }

    fn cursor_strategy(&self) -> CursorStrategy {
        CursorStrategy::Probe
    }

    fn build_page_request(&self, pair: &str, cursor: &Cursor) -> Request {
        Request::new("/trade")
            .param("symbol", pair)
            .param("start", cursor.sequence().unwrap_or(0))
            .param("count", LIMIT)
    }

    fn parse_trades(&self, pair: &str, body: &Value) -> Result<Vec<Trade>, ParseError> {
        let ex = self.exchange();
        array(ex, body, "trades")?
            .iter()
            .map(|row| {
                let mut trade = Trade::new(
                    pair,
                    None,
                    timestamp(ex, text(ex, field(ex, row, "timestamp")?, "timestamp")?)?,
                    number(ex, field(ex, row, "price")?, "price")?,
                    number(ex, field(ex, row, "size")?, "size")?,
                    side(ex, row.get("side").and_then(Value::as_str).unwrap_or(""))?,
                );
                for name in EXTRA_COLUMNS {
                    trade = trade.with_extra(name, passthrough(row.get(name).unwrap_or(&Value::Null)));
                }
                Ok(trade)
            })
            .collect()
    }

    fn parse_page(&self, pair: &str, cursor: &Cursor, body: &Value) -> Result<Page, ParseError> {
        let offset = cursor.sequence().unwrap_or(0);
        let mut trades = self.parse_trades(pair, body)?;
        for (i, trade) in trades.iter_mut().enumerate() {
            trade.sequence = Some(offset + i as u64);
        }
        Ok(Page::new(trades))
    }

    fn latest_request(&self, pair: &str) -> Option<Request> {
        Some(
            Request::new("/trade")
                .param("symbol", pair)
                .param("count", 1)
                .param("reverse", "true"),
        )
    }

    fn api_error(&self, body: &Value) -> Option<String> {
        let error = body.get("error")?;
        Some(
            error
                .get("message")
                .map_or_else(|| passthrough(error), passthrough),
        )
    }
}
