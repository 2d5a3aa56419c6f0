//! Scripted exchanges serving a synthetic trade history in each
//! exchange's wire format.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use serde_json::{Value, json};
use trawl_types::{Exchange, Side, Trade, time};

use crate::{FnTransport, Request, Transport, TransportError};

/// Builds `n` trades with ids `1..=n`, `step` seconds apart from `first_ts`.
pub(crate) fn history(pair: &str, n: u64, first_ts: i64, step: i64) -> Vec<Trade> {
    (1..=n)
        .map(|id| {
            let side = if id % 3 == 0 { Side::Sell } else { Side::Buy };
            Trade::new(
                pair,
                Some(id),
                first_ts + (id as i64 - 1) * step,
                100.0 + (id % 7) as f64,
                1.0 + (id % 4) as f64 * 0.25,
                side,
            )
        })
        .collect()
}

#[derive(Debug, Clone)]
pub(crate) struct Market {
    trades: Arc<Mutex<Vec<Trade>>>,
    calls: Arc<AtomicUsize>,
    outage_after: Arc<AtomicUsize>,
}

impl Market {
    pub(crate) fn new(trades: Vec<Trade>) -> Self {
        Self {
            trades: Arc::new(Mutex::new(trades)),
            calls: Arc::new(AtomicUsize::new(0)),
            outage_after: Arc::new(AtomicUsize::new(usize::MAX)),
        }
    }

    pub(crate) fn extend(&self, more: Vec<Trade>) {
        self.trades.lock().unwrap().extend(more);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fails every request once `n` requests have been served.
    pub(crate) fn outage_after(&self, n: usize) {
        self.outage_after.store(n, Ordering::SeqCst);
    }

    pub(crate) fn restore(&self) {
        self.outage_after.store(usize::MAX, Ordering::SeqCst);
    }

    pub(crate) fn transport(&self, exchange: Exchange) -> Arc<dyn Transport> {
        let market = self.clone();
        Arc::new(FnTransport::new(move |req: &Request| {
            let n = market.calls.fetch_add(1, Ordering::SeqCst);
            if n >= market.outage_after.load(Ordering::SeqCst) {
                return Err(TransportError::Status {
                    status: 503,
                    body: "maintenance".into(),
                });
            }
            let trades = market.trades.lock().unwrap();
            Ok(match exchange {
                Exchange::Coinbase => coinbase(&trades, req),
                Exchange::Kraken => kraken(&trades, req),
                Exchange::Binance => binance(&trades, req),
                Exchange::Bitmex => bitmex(&trades, req),
                Exchange::Poloniex => poloniex(&trades, req),
            })
        }))
    }
}

fn param<T: std::str::FromStr>(req: &Request, key: &str) -> Option<T> {
    req.get(key).and_then(|v| v.parse().ok())
}

fn coinbase(trades: &[Trade], req: &Request) -> Value {
    let after: u64 = param(req, "after").unwrap_or(u64::MAX);
    let limit: usize = param(req, "limit").unwrap_or(100);
    let rows: Vec<Value> = trades
        .iter()
        .rev()
        .filter(|t| t.sequence.is_some_and(|s| s < after))
        .take(limit)
        .map(|t| {
            json!({
                "time": time::unix_to_iso(t.timestamp),
                "trade_id": t.sequence,
                "price": t.price.to_string(),
                "size": t.size.to_string(),
                "side": t.side.as_str(),
            })
        })
        .collect();
    Value::Array(rows)
}

fn kraken(trades: &[Trade], req: &Request) -> Value {
    let since: i128 = param(req, "since").unwrap_or(0);
    let rows: Vec<&Trade> = trades
        .iter()
        .filter(|t| i128::from(t.timestamp) * 1_000_000_000 > since)
        .take(1000)
        .collect();
    let last = rows
        .last()
        .map_or(since, |t| i128::from(t.timestamp) * 1_000_000_000);
    let rows: Vec<Value> = rows
        .iter()
        .map(|t| {
            let side = if t.side.is_sell() { "s" } else { "b" };
            json!([t.price.to_string(), t.size.to_string(), t.timestamp as f64, side, "l", ""])
        })
        .collect();
    json!({ "error": [], "result": { "XXBTZUSD": rows, "last": last.to_string() } })
}

fn binance(trades: &[Trade], req: &Request) -> Value {
    let limit: usize = param(req, "limit").unwrap_or(500);
    let selected: Vec<&Trade> = if let Some(from) = param::<u64>(req, "fromId") {
        trades
            .iter()
            .filter(|t| t.sequence.is_some_and(|s| s >= from))
            .take(limit)
            .collect()
    } else if let Some(start) = param::<i64>(req, "startTime") {
        let end: i64 = param(req, "endTime").unwrap_or(i64::MAX);
        trades
            .iter()
            .filter(|t| t.timestamp * 1000 >= start && t.timestamp * 1000 <= end)
            .take(limit)
            .collect()
    } else {
        let skip = trades.len().saturating_sub(limit);
        trades.iter().skip(skip).collect()
    };
    Value::Array(
        selected
            .iter()
            .map(|t| {
                json!({
                    "a": t.sequence, "p": t.price.to_string(), "q": t.size.to_string(),
                    "T": t.timestamp * 1000, "m": t.side.is_sell(), "M": true
                })
            })
            .collect(),
    )
}

fn bitmex(trades: &[Trade], req: &Request) -> Value {
    let count: usize = param(req, "count").unwrap_or(500);
    let row = |t: &Trade| {
        json!({
            "timestamp": time::unix_to_iso(t.timestamp),
            "symbol": "XBTUSD",
            "side": if t.side.is_sell() { "Sell" } else { "Buy" },
            "size": t.size, "price": t.price, "tickDirection": "ZeroPlusTick",
            "trdMatchID": format!("m{}", t.sequence.unwrap_or(0)),
            "grossValue": 1, "homeNotional": t.size, "foreignNotional": null
        })
    };
    if req.get("reverse") == Some("true") {
        return Value::Array(trades.iter().rev().take(count).map(row).collect());
    }
    let start: usize = param(req, "start").unwrap_or(0);
    Value::Array(trades.iter().skip(start).take(count).map(row).collect())
}

fn poloniex(trades: &[Trade], req: &Request) -> Value {
    let start: i64 = param(req, "start").unwrap_or(0);
    let end: i64 = param(req, "end").unwrap_or(i64::MAX);
    Value::Array(
        trades
            .iter()
            .rev()
            .filter(|t| t.timestamp >= start && t.timestamp <= end)
            .map(|t| {
                let date = time::unix_to_iso(t.timestamp).replace('T', " ").replace('Z', "");
                json!({
                    "globalTradeID": t.sequence.unwrap_or(0) + 1000,
                    "tradeID": t.sequence,
                    "date": date,
                    "type": t.side.as_str(),
                    "rate": t.price.to_string(),
                    "amount": t.size.to_string(),
                    "total": t.notional().to_string(),
                })
            })
            .collect(),
    )
}
