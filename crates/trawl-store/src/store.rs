//! The storage interface.

use async_trait::async_trait;
use trawl_types::Trade;

use crate::StoreError;

/// Append-only, ordered trade log keyed by pair.
///
/// Implementations never reorder or rewrite stored trades. Each
/// [`append`](TickStore::append) is atomic: either the whole batch is
/// visible afterwards or none of it is. Concurrent appends to the same
/// pair are serialized; different pairs are independent.
#[async_trait]
pub trait TickStore: Send + Sync + std::fmt::Debug {
    /// Returns true if anything was ever stored for the pair.
    async fn exists(&self, pair: &str) -> Result<bool, StoreError>;

    /// Appends trades to the pair's log.
    ///
    /// Rejects batches that would break timestamp or sequence ordering
    /// against the log's tail.
    async fn append(&self, pair: &str, trades: &[Trade]) -> Result<(), StoreError>;

    /// Returns the most recently stored trade.
    async fn last(&self, pair: &str) -> Result<Option<Trade>, StoreError> {
        Ok(self.last_run(pair).await?.pop())
    }

    /// Returns the trailing trades that share the last stored timestamp.
    async fn last_run(&self, pair: &str) -> Result<Vec<Trade>, StoreError>;

    /// Returns stored trades with `start <= timestamp <= end`, in order.
    async fn range(&self, pair: &str, start: i64, end: i64) -> Result<Vec<Trade>, StoreError>;

    /// Returns the number of stored trades.
    async fn len(&self, pair: &str) -> Result<usize, StoreError>;
}

/// Checks that `batch` may follow `previous` without breaking ordering.
///
/// Timestamps must be non-decreasing. Where both neighbours carry a
/// sequence it must strictly increase.
///
/// # Errors
///
/// Returns [`StoreError::OutOfOrder`] naming the first violation.
pub fn check_order(pair: &str, previous: Option<&Trade>, batch: &[Trade]) -> Result<(), StoreError> {
    let mut prev = previous;
    for trade in batch {
        if let Some(p) = prev {
            if trade.timestamp < p.timestamp {
                return Err(StoreError::OutOfOrder {
                    pair: pair.to_string(),
                    reason: format!("timestamp {} after {}", trade.timestamp, p.timestamp),
                });
            }
            if let (Some(a), Some(b)) = (p.sequence, trade.sequence)
                && b <= a
            {
                return Err(StoreError::OutOfOrder {
                    pair: pair.to_string(),
                    reason: format!("sequence {b} after {a}"),
                });
            }
        }
        prev = Some(trade);
    }
    Ok(())
}

/// Returns the trailing trades sharing the last timestamp of `trades`.
#[must_use]
pub fn trailing_run(trades: &[Trade]) -> Vec<Trade> {
    let Some(last) = trades.last() else {
        return Vec::new();
    };
    let start = trades
        .iter()
        .rposition(|t| t.timestamp != last.timestamp)
        .map_or(0, |i| i + 1);
    trades[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use trawl_types::Side;

    fn trade(seq: Option<u64>, ts: i64) -> Trade {
        Trade::new("p", seq, ts, 1.0, 1.0, Side::Buy)
    }

    #[test]
    fn test_check_order_accepts_ties() {
        let prev = trade(None, 10);
        assert!(check_order("p", Some(&prev), &[trade(None, 10), trade(None, 11)]).is_ok());
    }

    #[test]
    fn test_check_order_rejects_time_regression() {
        let prev = trade(None, 10);
        assert!(matches!(
            check_order("p", Some(&prev), &[trade(None, 9)]),
            Err(StoreError::OutOfOrder { .. })
        ));
    }

    #[test]
    fn test_check_order_rejects_duplicate_sequence() {
        let batch = [trade(Some(5), 10), trade(Some(5), 10)];
        assert!(check_order("p", None, &batch).is_err());
    }

    #[test]
    fn test_trailing_run() {
        let trades = [trade(None, 1), trade(None, 2), trade(None, 2)];
        assert_eq!(trailing_run(&trades).len(), 2);
        assert_eq!(trailing_run(&trades[..1]).len(), 1);
        assert!(trailing_run(&[]).is_empty());
    }
}
