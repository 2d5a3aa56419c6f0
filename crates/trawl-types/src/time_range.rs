//! Time range for trade and bar queries.

use crate::{Interval, TimeRangeError, time};

/// An inclusive range of UNIX seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Start (inclusive).
    pub start: i64,
    /// End (inclusive).
    pub end: i64,
}

impl TimeRange {
    /// Creates a new range, validating that start <= end.
    ///
    /// # Errors
    ///
    /// Returns an error if start > end.
    pub const fn new(start: i64, end: i64) -> Result<Self, TimeRangeError> {
        if start > end {
            return Err(TimeRangeError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parses both bounds with [`time::iso_to_unix`].
    ///
    /// # Errors
    ///
    /// Returns an error if either bound is malformed or start > end.
    pub fn parse(start: &str, end: &str) -> Result<Self, TimeRangeError> {
        Self::new(time::iso_to_unix(start)?, time::iso_to_unix(end)?)
    }

    /// Returns the range length in seconds.
    #[must_use]
    pub const fn duration(&self) -> i64 {
        self.end - self.start
    }

    /// Returns true if the range contains the given timestamp.
    #[must_use]
    pub const fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Returns the right edges of the bar buckets covering this range.
    ///
    /// Edges are `start + k * interval` for `k >= 1` while `<= end`.
    pub fn bucket_edges(&self, interval: Interval) -> impl Iterator<Item = i64> + use<> {
        let step = interval.as_i64();
        let (start, end) = (self.start, self.end);
        (1..)
            .map(move |k: i64| start + k * step)
            .take_while(move |edge| *edge <= end)
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to {}",
            time::unix_to_iso(self.start),
            time::unix_to_iso(self.end)
        )
    }
}
