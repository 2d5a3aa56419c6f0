//! OHLCV bar data structure.

use serde::{Deserialize, Serialize};

/// One fixed-width time bucket.
///
/// The bucket covers `(bucket_end_time - interval, bucket_end_time]`.
/// Volumes and counts include only trades with a known side, so
/// `volume == buy_volume + sell_volume` and `n_trades == n_buys + n_sells`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Inclusive right edge of the bucket (UNIX seconds).
    pub bucket_end_time: i64,
    /// Previous bar's close, or the first trade's price for the first bar.
    pub open: f64,
    /// Highest trade price in the bucket.
    pub high: f64,
    /// Lowest trade price in the bucket.
    pub low: f64,
    /// Last trade price in the bucket.
    pub close: f64,
    /// Traded base-asset quantity.
    pub volume: f64,
    /// Size-weighted mean price.
    pub weighted_average_price: f64,
    /// Quantity bought by takers.
    pub buy_volume: f64,
    /// Size-weighted mean price of taker buys.
    pub buy_weighted_average_price: f64,
    /// Number of taker buys.
    pub n_buys: u64,
    /// Quantity sold by takers.
    pub sell_volume: f64,
    /// Size-weighted mean price of taker sells.
    pub sell_weighted_average_price: f64,
    /// Number of taker sells.
    pub n_sells: u64,
    /// Number of trades (`n_buys + n_sells`).
    pub n_trades: u64,
}

impl Bar {
    /// Creates a bar for a bucket without trades, flat at `price`.
    #[must_use]
    pub const fn flat(bucket_end_time: i64, price: f64) -> Self {
        Self {
            bucket_end_time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
            weighted_average_price: price,
            buy_volume: 0.0,
            buy_weighted_average_price: price,
            n_buys: 0,
            sell_volume: 0.0,
            sell_weighted_average_price: price,
            n_sells: 0,
            n_trades: 0,
        }
    }

    /// Returns true if no buy or sell fell into the bucket.
    ///
    /// Trades with an unknown side move the price path without being
    /// counted, so a bucket holding only such trades is empty even when
    /// its high and low differ.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.n_trades == 0
    }

    /// Returns the price range (high - low).
    #[must_use]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Returns true if the bar closed above its open.
    #[must_use]
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Returns true if the bar closed below its open.
    #[must_use]
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Returns buy volume minus sell volume.
    #[must_use]
    pub fn net_flow(&self) -> f64 {
        self.buy_volume - self.sell_volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_flat_bar() {
        let bar = Bar::flat(60, 101.5);
        assert!(bar.is_empty());
        assert_relative_eq!(bar.range(), 0.0);
        assert_relative_eq!(bar.buy_weighted_average_price, 101.5);
        assert!(!bar.is_bullish());
        assert!(!bar.is_bearish());
    }

    #[test]
    fn test_net_flow() {
        let bar = Bar {
            buy_volume: 3.0,
            sell_volume: 1.25,
            volume: 4.25,
            n_buys: 2,
            n_sells: 1,
            n_trades: 3,
            close: 101.0,
            ..Bar::flat(60, 100.0)
        };
        assert_relative_eq!(bar.net_flow(), 1.75);
        assert!(bar.is_bullish());
        assert!(!bar.is_empty());
    }
}
