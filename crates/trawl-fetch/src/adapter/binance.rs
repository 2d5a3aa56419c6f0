//! Binance spot.
//!
//! `GET /aggTrades?symbol=S&fromId=N&limit=500` returns aggregate trades
//! with id `>= N` (inclusive), oldest first. Rows carry `a` (id), `p`,
//! `q`, `T` (ms), `m` (buyer is maker, i.e. the taker sold) and `M`
//! (best price match). With `startTime`/`endTime` instead of `fromId` the
//! same endpoint doubles as a time lookup.

use serde_json::Value;
use trawl_types::{Cursor, Exchange, Side, Trade, time};

use super::{CursorStrategy, ExchangeAdapter, ParseError};
use super::{array, field, integer, number, passthrough, shape};
use crate::Request;

const LIMIT: usize = 500;

/// Binance adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Binance;

impl ExchangeAdapter for Binance {
    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }

    fn default_base_url(&self) -> &'static str {
        "https://api.binance.com/api/v3"
    }

    fn page_limit(&self) -> usize {
        LIMIT
    }

    fn extra_columns(&self) -> &'static [&'static str] {
        &["best_price_match"]
    }

    fn cursor_strategy(&self) -> CursorStrategy {
        CursorStrategy::TimeNative
    }

    fn build_page_request(&self, pair: &str, cursor: &Cursor) -> Request {
        let req = Request::new("/aggTrades").param("symbol", pair);
        match cursor {
            Cursor::Time(t) | Cursor::Window { start: t, .. } => req
                .param("startTime", t.saturating_mul(1000))
                .param("endTime", t.saturating_add(self.time_lookup_window()).saturating_mul(1000) - 1)
                .param("limit", LIMIT),
            _ => req
                .param("fromId", cursor.sequence().unwrap_or(0))
                .param("limit", LIMIT),
        }
    }

    fn parse_trades(&self, pair: &str, body: &Value) -> Result<Vec<Trade>, ParseError> {
        let ex = self.exchange();
        array(ex, body, "aggTrades")?
            .iter()
            .map(|row| {
                let millis = integer(ex, field(ex, row, "T")?, "T")?;
                let buyer_is_maker = field(ex, row, "m")?
                    .as_bool()
                    .ok_or_else(|| shape(ex, "m is not a bool"))?;
                Ok(Trade::new(
                    pair,
                    Some(integer(ex, field(ex, row, "a")?, "a")?),
                    time::millis_to_secs(millis as i64),
                    number(ex, field(ex, row, "p")?, "p")?,
                    number(ex, field(ex, row, "q")?, "q")?,
                    if buyer_is_maker { Side::Sell } else { Side::Buy },
                )
                .with_extra("best_price_match", passthrough(row.get("M").unwrap_or(&Value::Null))))
            })
            .collect()
    }

    fn latest_request(&self, pair: &str) -> Option<Request> {
        Some(
            Request::new("/aggTrades")
                .param("symbol", pair)
                .param("limit", 1),
        )
    }

    fn time_lookup_request(&self, pair: &str, from: i64, to: i64) -> Option<Request> {
        Some(
            Request::new("/aggTrades")
                .param("symbol", pair)
                .param("startTime", from.saturating_mul(1000))
                .param("endTime", to.saturating_mul(1000) + 999)
                .param("limit", 1),
        )
    }

    fn api_error(&self, body: &Value) -> Option<String> {
        let code = body.get("code")?;
        let msg = body.get("msg").map(passthrough).unwrap_or_default();
        Some(format!("{} {msg}", passthrough(code)).trim_end().to_string())
    }
}
