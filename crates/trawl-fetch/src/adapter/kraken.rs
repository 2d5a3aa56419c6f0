//! Kraken.
//!
//! `GET /public/Trades?pair=P&since=NS` returns up to 1000 trades newer
//! than `since` (a nanosecond timestamp, exclusive), oldest first, plus a
//! `last` token to pass as the next `since`. Rows are
//! `[price, volume, time, "b"|"s", "m"|"l", misc]` with fractional-second
//! times.

use serde_json::Value;
use trawl_types::{Cursor, Exchange, Trade};

use super::{CursorStrategy, ExchangeAdapter, Page, ParseError};
use super::{array, number, passthrough, shape, side, text};
use crate::Request;

const LIMIT: usize = 1000;
const NANOS: i64 = 1_000_000_000;

/// Kraken adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Kraken;

impl Kraken {
    /// Translates an inclusive cursor into Kraken's exclusive `since`.
    fn since(cursor: &Cursor) -> String {
        match cursor {
            Cursor::Token(token) => token.clone(),
            Cursor::Time(t) | Cursor::Window { start: t, .. } => {
                t.saturating_mul(NANOS).saturating_sub(1).max(0).to_string()
            }
            Cursor::Sequence(n) => n.to_string(),
        }
    }

    fn rows<'a>(pair: &str, body: &'a Value) -> Result<&'a [Value], ParseError> {
        let ex = Exchange::Kraken;
        let result = body
            .get("result")
            .ok_or_else(|| shape(ex, "missing result"))?;
        // Kraken may answer under its canonical pair name.
        let rows = result.get(pair).or_else(|| {
            result
                .as_object()
                .and_then(|obj| obj.iter().find(|(k, v)| *k != "last" && v.is_array()))
                .map(|(_, v)| v)
        });
        match rows {
            Some(rows) => array(ex, rows, "result rows"),
            None => Ok(&[]),
        }
    }
}

impl ExchangeAdapter for Kraken {
    fn exchange(&self) -> Exchange {
        Exchange::Kraken
    }

    fn default_base_url(&self) -> &'static str {
        "https://api.kraken.com/0"
    }

    fn page_limit(&self) -> usize {
        LIMIT
    }

    fn extra_columns(&self) -> &'static [&'static str] {
        &["order_type"]
    }

    fn cursor_strategy(&self) -> CursorStrategy {
        CursorStrategy::TimeNative
    }

    fn earliest_cursor(&self) -> Cursor {
        Cursor::Time(0)
    }

    fn build_page_request(&self, pair: &str, cursor: &Cursor) -> Request {
        Request::new("/public/Trades")
            .param("pair", pair)
            .param("since", Self::since(cursor))
    }

    fn parse_trades(&self, pair: &str, body: &Value) -> Result<Vec<Trade>, ParseError> {
        let ex = self.exchange();
        Self::rows(pair, body)?
            .iter()
            .map(|row| {
                let cols = array(ex, row, "trade row")?;
                if cols.len() < 5 {
                    return Err(shape(ex, format!("short trade row {row}")));
                }
                let time = number(ex, &cols[2], "time")?;
                Ok(Trade::new(
                    pair,
                    None,
                    trawl_types::time::fractional_to_secs(time),
                    number(ex, &cols[0], "price")?,
                    number(ex, &cols[1], "volume")?,
                    side(ex, text(ex, &cols[3], "side")?)?,
                )
                .with_extra("order_type", passthrough(&cols[4])))
            })
            .collect()
    }

    fn parse_page(&self, pair: &str, cursor: &Cursor, body: &Value) -> Result<Page, ParseError> {
        let trades = self.parse_trades(pair, body)?;
        let raw_len = trades.len();
        let floor = cursor.time_hint().filter(|_| !matches!(cursor, Cursor::Token(_)));
        Ok(Page {
            trades: trades
                .into_iter()
                .filter(|t| floor.is_none_or(|f| t.timestamp >= f))
                .collect(),
            raw_len,
            continuation: body
                .get("result")
                .and_then(|r| r.get("last"))
                .map(passthrough)
                .filter(|last| !last.is_empty())
                .map(Cursor::Token),
        })
    }

    fn api_error(&self, body: &Value) -> Option<String> {
        let errors = body.get("error")?.as_array()?;
        if errors.is_empty() {
            return None;
        }
        Some(
            errors
                .iter()
                .map(passthrough)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}
