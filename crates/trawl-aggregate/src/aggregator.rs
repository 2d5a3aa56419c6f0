//! Streaming trade-to-bar aggregation.

use thiserror::Error;
use trawl_types::{Interval, Side, TimeRange, Trade};

use crate::Bar;

/// Errors raised while aggregating.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateError {
    /// A trade arrived with a timestamp older than its predecessor.
    #[error("trade at {timestamp} arrived after a trade at {previous}")]
    OutOfOrder {
        /// Timestamp of the offending trade.
        timestamp: i64,
        /// Timestamp of the trade before it.
        previous: i64,
    },
}

/// Streaming trade aggregator.
///
/// Bucket right edges are `start + k * interval` for `k >= 1` while the
/// edge is at most `end`. Bucket `k` covers `(edge - interval, edge]`.
/// Trades at or before `start`, or after the last edge, are ignored.
///
/// Each bar opens at the previous bar's close; only the very first bar
/// opens at its first trade. Buckets without trades are emitted flat at
/// the previous close (0 if there is none), so the output is a regular
/// grid with no missing buckets.
#[derive(Debug)]
pub struct BarAggregator {
    interval: Interval,
    next_edge: i64,
    last_edge: i64,
    previous_close: Option<f64>,
    previous_timestamp: Option<i64>,
    bucket: Option<Bucket>,
}

impl BarAggregator {
    /// Creates an aggregator for the given range and interval.
    #[must_use]
    pub const fn new(range: TimeRange, interval: Interval) -> Self {
        let step = interval.as_i64();
        let buckets = range.duration() / step;
        Self {
            interval,
            next_edge: range.start + step,
            last_edge: range.start + buckets * step,
            previous_close: None,
            previous_timestamp: None,
            bucket: None,
        }
    }

    /// Returns the bar width.
    #[must_use]
    pub const fn interval(&self) -> Interval {
        self.interval
    }

    /// Returns how many bars are still to be emitted.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        if self.next_edge > self.last_edge {
            0
        } else {
            ((self.last_edge - self.next_edge) / self.interval.as_i64() + 1) as usize
        }
    }

    /// Processes a trade, returning the bars it completes.
    ///
    /// A trade completes every bucket whose right edge lies before it,
    /// including empty ones.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::OutOfOrder`] if the trade is older than
    /// the previous one.
    pub fn process(&mut self, trade: &Trade) -> Result<Vec<Bar>, AggregateError> {
        if let Some(previous) = self.previous_timestamp
            && trade.timestamp < previous
        {
            return Err(AggregateError::OutOfOrder {
                timestamp: trade.timestamp,
                previous,
            });
        }
        self.previous_timestamp = Some(trade.timestamp);

        if trade.timestamp <= self.next_edge - self.interval.as_i64() {
            return Ok(Vec::new());
        }

        let mut completed = Vec::new();
        while trade.timestamp > self.next_edge && self.next_edge <= self.last_edge {
            completed.push(self.close_bucket());
        }
        if self.next_edge <= self.last_edge {
            match &mut self.bucket {
                Some(bucket) => bucket.add(trade),
                None => self.bucket = Some(Bucket::new(trade)),
            }
        }
        Ok(completed)
    }

    /// Emits the remaining bars through the last edge.
    #[must_use]
    pub fn finish(mut self) -> Vec<Bar> {
        let mut bars = Vec::with_capacity(self.remaining());
        while self.next_edge <= self.last_edge {
            bars.push(self.close_bucket());
        }
        bars
    }

    fn close_bucket(&mut self) -> Bar {
        let bar = match self.bucket.take() {
            Some(bucket) => bucket.finish(self.next_edge, self.previous_close),
            None => Bar::flat(self.next_edge, self.previous_close.unwrap_or(0.0)),
        };
        self.previous_close = Some(bar.close);
        self.next_edge += self.interval.as_i64();
        bar
    }
}

/// Aggregates an ordered trade slice into bars covering `range`.
///
/// # Errors
///
/// Returns [`AggregateError::OutOfOrder`] if the trades are not sorted by
/// timestamp.
pub fn aggregate(
    trades: &[Trade],
    range: TimeRange,
    interval: Interval,
) -> Result<Vec<Bar>, AggregateError> {
    let mut aggregator = BarAggregator::new(range, interval);
    let mut bars = Vec::with_capacity(aggregator.remaining());
    for trade in trades {
        bars.extend(aggregator.process(trade)?);
    }
    bars.extend(aggregator.finish());
    Ok(bars)
}

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    volume: f64,
    notional: f64,
    count: u64,
}

impl Totals {
    fn add(&mut self, trade: &Trade) {
        self.volume += trade.size;
        self.notional += trade.notional();
        self.count += 1;
    }

    fn merged(self, other: Self) -> Self {
        Self {
            volume: self.volume + other.volume,
            notional: self.notional + other.notional,
            count: self.count + other.count,
        }
    }

    /// Size-weighted mean price, or `fallback` when nothing traded.
    fn average(&self, fallback: f64) -> f64 {
        if self.volume > 0.0 {
            self.notional / self.volume
        } else {
            fallback
        }
    }
}

/// Accumulates one bucket's trades.
#[derive(Debug)]
struct Bucket {
    first: f64,
    high: f64,
    low: f64,
    close: f64,
    buys: Totals,
    sells: Totals,
}

impl Bucket {
    fn new(trade: &Trade) -> Self {
        let mut bucket = Self {
            first: trade.price,
            high: trade.price,
            low: trade.price,
            close: trade.price,
            buys: Totals::default(),
            sells: Totals::default(),
        };
        bucket.add_volume(trade);
        bucket
    }

    fn add(&mut self, trade: &Trade) {
        self.high = self.high.max(trade.price);
        self.low = self.low.min(trade.price);
        self.close = trade.price;
        self.add_volume(trade);
    }

    // Unknown sides move the price path only.
    fn add_volume(&mut self, trade: &Trade) {
        match trade.side {
            Side::Buy => self.buys.add(trade),
            Side::Sell => self.sells.add(trade),
            Side::Unknown => {}
        }
    }

    fn finish(self, bucket_end_time: i64, previous_close: Option<f64>) -> Bar {
        let open = previous_close.unwrap_or(self.first);
        let all = self.buys.merged(self.sells);
        Bar {
            bucket_end_time,
            open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: all.volume,
            weighted_average_price: all.average(open),
            buy_volume: self.buys.volume,
            buy_weighted_average_price: self.buys.average(open),
            n_buys: self.buys.count,
            sell_volume: self.sells.volume,
            sell_weighted_average_price: self.sells.average(open),
            n_sells: self.sells.count,
            n_trades: all.count,
        }
    }
}
