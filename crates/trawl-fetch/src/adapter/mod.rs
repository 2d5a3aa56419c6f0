//! Per-exchange API translation.
//!
//! An [`ExchangeAdapter`] knows how one exchange spells a page request,
//! where each trade field lives in the response, which side encoding it
//! uses, and whether its cursor parameters are inclusive or exclusive.
//! Everything else (retries, resolution, paging, persistence) is shared.

mod binance;
mod bitmex;
mod coinbase;
mod kraken;
mod poloniex;

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use trawl_types::{Cursor, Exchange, Side, Trade};

use crate::Request;

pub use binance::Binance;
pub use bitmex::Bitmex;
pub use coinbase::Coinbase;
pub use kraken::Kraken;
pub use poloniex::Poloniex;

/// How the resolver maps a start time to a first cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStrategy {
    /// The API pages by time windows; the start time is the cursor.
    Direct,
    /// The API accepts a time parameter or offers a time lookup.
    TimeNative,
    /// Sequence ids are searchable by bisection over `[earliest, latest]`.
    BinarySearch,
    /// Dense offsets without time lookup; gallop then bisect.
    Probe,
}

/// One normalized page of trades.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    /// Canonical trades, oldest first, already filtered to the cursor.
    pub trades: Vec<Trade>,
    /// Records in the raw response, before filtering.
    pub raw_len: usize,
    /// Where the exchange says the next page starts, if it says so.
    pub continuation: Option<Cursor>,
}

impl Page {
    /// Creates a page whose raw length equals its trade count.
    #[must_use]
    pub fn new(trades: Vec<Trade>) -> Self {
        let raw_len = trades.len();
        Self {
            trades,
            raw_len,
            continuation: None,
        }
    }

    /// Returns the oldest trade.
    #[must_use]
    pub fn first(&self) -> Option<&Trade> {
        self.trades.first()
    }

    /// Returns the newest trade.
    #[must_use]
    pub fn last(&self) -> Option<&Trade> {
        self.trades.last()
    }
}

/// Errors raised while decoding a response body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The body did not have the expected structure.
    #[error("{exchange}: unexpected response shape: {detail}")]
    Shape {
        /// Exchange that sent the body.
        exchange: Exchange,
        /// What was missing or wrong.
        detail: String,
    },

    /// A field could not be converted.
    #[error("{exchange}: invalid {field}: {value}")]
    Field {
        /// Exchange that sent the body.
        exchange: Exchange,
        /// Field name.
        field: &'static str,
        /// Offending raw value.
        value: String,
    },
}

/// Translation layer between one exchange's REST API and canonical trades.
pub trait ExchangeAdapter: Send + Sync + std::fmt::Debug {
    /// The exchange this adapter speaks to.
    fn exchange(&self) -> Exchange;

    /// Default base URL of the exchange's REST API.
    fn default_base_url(&self) -> &'static str;

    /// Maximum trades the exchange returns per page.
    fn page_limit(&self) -> usize;

    /// Exchange-specific pass-through columns, in storage order.
    fn extra_columns(&self) -> &'static [&'static str] {
        &[]
    }

    /// Resolution strategy for start cursors.
    fn cursor_strategy(&self) -> CursorStrategy;

    /// Cursor of the very first page of history.
    fn earliest_cursor(&self) -> Cursor {
        Cursor::Sequence(0)
    }

    /// Builds the request for the page starting at `cursor` (inclusive).
    fn build_page_request(&self, pair: &str, cursor: &Cursor) -> Request;

    /// Decodes a body into canonical trades, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the body does not match the exchange's schema.
    fn parse_trades(&self, pair: &str, body: &Value) -> Result<Vec<Trade>, ParseError>;

    /// Decodes a page response fetched with `cursor`.
    ///
    /// Trades the exchange returned from before the cursor are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the body does not match the exchange's schema.
    fn parse_page(&self, pair: &str, cursor: &Cursor, body: &Value) -> Result<Page, ParseError> {
        let trades = self.parse_trades(pair, body)?;
        let raw_len = trades.len();
        Ok(Page {
            trades: trades
                .into_iter()
                .filter(|t| at_or_after(cursor, t))
                .collect(),
            raw_len,
            continuation: None,
        })
    }

    /// Returns true if no page follows this one.
    fn page_is_final(&self, _cursor: &Cursor, page: &Page) -> bool {
        page.raw_len < self.page_limit()
    }

    /// Returns true if ids can skip, so a short page does not prove the
    /// history is exhausted.
    ///
    /// Downloads then capture the newest id once per run and stop only when
    /// the cursor moves past it.
    fn ids_have_gaps(&self) -> bool {
        false
    }

    /// Cursor of the page after `page`.
    fn next_cursor(&self, cursor: &Cursor, page: &Page) -> Cursor {
        if let Some(next) = &page.continuation {
            return next.clone();
        }
        page.last()
            .map_or_else(|| cursor.clone(), |last| self.resume_cursor(last))
    }

    /// Cursor that continues after a stored trade.
    fn resume_cursor(&self, last: &Trade) -> Cursor {
        last.sequence.map_or(Cursor::Time(last.timestamp), |seq| {
            Cursor::Sequence(seq + 1)
        })
    }

    /// Request returning the most recent trade, if the exchange has one.
    fn latest_request(&self, _pair: &str) -> Option<Request> {
        None
    }

    /// Decodes the response of [`latest_request`](Self::latest_request).
    ///
    /// # Errors
    ///
    /// Returns an error if the body does not match the exchange's schema.
    fn parse_latest(&self, pair: &str, body: &Value) -> Result<Option<Trade>, ParseError> {
        Ok(self.parse_trades(pair, body)?.pop())
    }

    /// Request returning the first trade within `[from, to]`, if supported.
    fn time_lookup_request(&self, _pair: &str, _from: i64, _to: i64) -> Option<Request> {
        None
    }

    /// Width of one time-lookup window in seconds.
    fn time_lookup_window(&self) -> i64 {
        3600
    }

    /// Extracts an error message from an otherwise successful response.
    fn api_error(&self, _body: &Value) -> Option<String> {
        None
    }
}

/// Returns the adapter for an exchange.
#[must_use]
pub fn adapter_for(exchange: Exchange) -> Arc<dyn ExchangeAdapter> {
    match exchange {
        Exchange::Coinbase => Arc::new(Coinbase),
        Exchange::Kraken => Arc::new(Kraken),
        Exchange::Binance => Arc::new(Binance),
        Exchange::Bitmex => Arc::new(Bitmex),
        Exchange::Poloniex => Arc::new(Poloniex),
    }
}

/// Returns true if `trade` is not before the inclusive `cursor`.
fn at_or_after(cursor: &Cursor, trade: &Trade) -> bool {
    match cursor {
        Cursor::Sequence(n) => trade.sequence.is_none_or(|s| s >= *n),
        Cursor::Time(t) => trade.timestamp >= *t,
        Cursor::Window { start, end } => trade.timestamp >= *start && trade.timestamp <= *end,
        Cursor::Token(_) => true,
    }
}

// Field helpers shared by the adapters.

fn shape(exchange: Exchange, detail: impl Into<String>) -> ParseError {
    ParseError::Shape {
        exchange,
        detail: detail.into(),
    }
}

fn array<'a>(exchange: Exchange, value: &'a Value, what: &str) -> Result<&'a [Value], ParseError> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| shape(exchange, format!("{what} is not an array")))
}

fn field<'a>(exchange: Exchange, row: &'a Value, key: &'static str) -> Result<&'a Value, ParseError> {
    row.get(key)
        .ok_or_else(|| shape(exchange, format!("missing field {key}")))
}

/// Reads a number that may be encoded as a JSON number or a numeric string.
fn number(exchange: Exchange, value: &Value, name: &'static str) -> Result<f64, ParseError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ParseError::Field {
        exchange,
        field: name,
        value: value.to_string(),
    })
}

fn integer(exchange: Exchange, value: &Value, name: &'static str) -> Result<u64, ParseError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ParseError::Field {
        exchange,
        field: name,
        value: value.to_string(),
    })
}

fn text<'a>(exchange: Exchange, value: &'a Value, name: &'static str) -> Result<&'a str, ParseError> {
    value.as_str().ok_or_else(|| ParseError::Field {
        exchange,
        field: name,
        value: value.to_string(),
    })
}

fn side(exchange: Exchange, value: &str) -> Result<Side, ParseError> {
    value.parse::<Side>().map_err(|_| ParseError::Field {
        exchange,
        field: "side",
        value: value.to_string(),
    })
}

fn timestamp(exchange: Exchange, value: &str) -> Result<i64, ParseError> {
    trawl_types::time::iso_to_unix(value).map_err(|_| ParseError::Field {
        exchange,
        field: "timestamp",
        value: value.to_string(),
    })
}

/// Renders a pass-through value the way it is stored on disk.
fn passthrough(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_filter() {
        let t = Trade::new("p", Some(10), 100, 1.0, 1.0, Side::Buy);
        assert!(at_or_after(&Cursor::Sequence(10), &t));
        assert!(!at_or_after(&Cursor::Sequence(11), &t));
        assert!(at_or_after(&Cursor::Time(100), &t));
        assert!(!at_or_after(&Cursor::Time(101), &t));
        assert!(!at_or_after(&Cursor::Window { start: 0, end: 99 }, &t));
        assert!(at_or_after(&Cursor::Token("x".into()), &t));
    }

    #[test]
    fn test_number_accepts_strings() {
        let ex = Exchange::Kraken;
        assert_eq!(number(ex, &Value::from("1.5"), "price").unwrap(), 1.5);
        assert_eq!(number(ex, &Value::from(2), "price").unwrap(), 2.0);
        assert!(number(ex, &Value::Bool(true), "price").is_err());
        assert_eq!(integer(ex, &Value::from("42"), "id").unwrap(), 42);
    }

    #[test]
    fn test_passthrough() {
        assert_eq!(passthrough(&Value::Null), "");
        assert_eq!(passthrough(&Value::from("PlusTick")), "PlusTick");
        assert_eq!(passthrough(&Value::from(12)), "12");
        assert_eq!(passthrough(&Value::Bool(true)), "true");
    }

    #[test]
    fn test_every_exchange_has_an_adapter() {
        for exchange in Exchange::all() {
            assert_eq!(adapter_for(*exchange).exchange(), *exchange);
        }
    }
}
