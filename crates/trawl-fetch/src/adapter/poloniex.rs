//! Poloniex.
//!
//! `GET /public?command=returnTradeHistory&currencyPair=P&start=S&end=E`
//! returns every trade in `[S, E]` (seconds, both inclusive), newest
//! first, capped at 50 000 rows. A capped answer is discarded and the
//! window narrowed to end at its oldest trade until it fits.

use serde_json::Value;
use trawl_types::{Cursor, Exchange, Trade, time};

use super::{CursorStrategy, ExchangeAdapter, Page, ParseError};
use super::{array, field, integer, number, passthrough, side, text, timestamp};
use crate::Request;

/// Rows at which the API truncates a window.
const SATURATION: usize = 50_000;

/// Widest window requested, a little under a month.
const WINDOW: i64 = 2_500_000;

/// Poloniex adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Poloniex;

impl Poloniex {
    /// Returns the inclusive window a cursor asks for.
    fn window(cursor: &Cursor) -> (i64, i64) {
        match cursor {
            Cursor::Window { start, end } => (*start, *end),
            other => {
                let start = other.time_hint().unwrap_or(0);
                (start, start.saturating_add(WINDOW - 1))
            }
        }
    }
}

impl ExchangeAdapter for Poloniex {
    fn exchange(&self) -> Exchange {
        Exchange::Poloniex
    }

    fn default_base_url(&self) -> &'static str {
        "https://poloniex.com"
    }

    fn page_limit(&self) -> usize {
        SATURATION
    }

    fn extra_columns(&self) -> &'static [&'static str] {
        &["globalTradeID", "total"]
    }

    fn cursor_strategy(&self) -> CursorStrategy {
        CursorStrategy::Direct
    }

    fn earliest_cursor(&self) -> Cursor {
        Cursor::Time(0)
    }

    fn build_page_request(&self, pair: &str, cursor: &Cursor) -> Request {
        let (start, end) = Self::window(cursor);
        Request::new("/public")
            .param("command", "returnTradeHistory")
            .param("currencyPair", pair)
            .param("start", start)
            .param("end", end)
    }

    fn parse_trades(&self, pair: &str, body: &Value) -> Result<Vec<Trade>, ParseError> {
        let ex = self.exchange();
        let mut trades = array(ex, body, "trade history")?
            .iter()
            .map(|row| {
                Ok(Trade::new(
                    pair,
                    Some(integer(ex, field(ex, row, "tradeID")?, "tradeID")?),
                    timestamp(ex, text(ex, field(ex, row, "date")?, "date")?)?,
                    number(ex, field(ex, row, "rate")?, "rate")?,
                    number(ex, field(ex, row, "amount")?, "amount")?,
                    side(ex, text(ex, field(ex, row, "type")?, "type")?)?,
                )
                .with_extra("globalTradeID", passthrough(row.get("globalTradeID").unwrap_or(&Value::Null)))
                .with_extra("total", passthrough(row.get("total").unwrap_or(&Value::Null))))
            })
            .collect::<Result<Vec<_>, ParseError>>()?;
        // newest first on the wire
        trades.reverse();
        Ok(trades)
    }

    fn parse_page(&self, pair: &str, cursor: &Cursor, body: &Value) -> Result<Page, ParseError> {
        let (start, end) = Self::window(cursor);
        let trades = self.parse_trades(pair, body)?;
        let raw_len = trades.len();

        if raw_len >= SATURATION
            && let Some(oldest) = trades.first().map(|t| t.timestamp)
            && oldest > start
        {
            return Ok(Page {
                trades: Vec::new(),
                raw_len,
                continuation: Some(Cursor::Window { start, end: oldest }),
            });
        }

        Ok(Page {
            trades: trades
                .into_iter()
                .filter(|t| t.timestamp >= start && t.timestamp <= end)
                .collect(),
            raw_len,
            continuation: None,
        })
    }

    fn page_is_final(&self, cursor: &Cursor, page: &Page) -> bool {
        let (_, end) = Self::window(cursor);
        page.continuation.is_none() && end >= time::now()
    }

    fn next_cursor(&self, cursor: &Cursor, page: &Page) -> Cursor {
        if let Some(next) = &page.continuation {
            return next.clone();
        }
        let (_, end) = Self::window(cursor);
        Cursor::Time(end.saturating_add(1))
    }

    fn resume_cursor(&self, last: &Trade) -> Cursor {
        // tradeID is not a request parameter; re-read the last stored second.
        Cursor::Time(last.timestamp)
    }

    fn api_error(&self, body: &Value) -> Option<String> {
        body.get("error").map(passthrough)
    }
}
