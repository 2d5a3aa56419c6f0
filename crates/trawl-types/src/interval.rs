//! Bar interval definitions.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Width of an OHLCV bar in seconds.
///
/// Parses plain seconds (`"60"`) or a count with a unit suffix
/// (`"90s"`, `"5m"`, `"1h"`, `"1d"`). The unit-first spellings `m1`,
/// `h4`, `d1` are accepted as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Interval(u64);

impl Interval {
    /// One minute.
    pub const MINUTE: Self = Self(60);
    /// One hour.
    pub const HOUR: Self = Self(3600);
    /// One day.
    pub const DAY: Self = Self(86_400);

    /// Creates an interval, rejecting zero.
    #[must_use]
    pub const fn from_seconds(seconds: u64) -> Option<Self> {
        if seconds == 0 { None } else { Some(Self(seconds)) }
    }

    /// Returns the width in seconds.
    #[must_use]
    pub const fn seconds(&self) -> u64 {
        self.0
    }

    /// Returns the width in seconds as a signed value for timestamp math.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0 as i64
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.0;
        if s % 86_400 == 0 {
            write!(f, "{}d", s / 86_400)
        } else if s % 3600 == 0 {
            write!(f, "{}h", s / 3600)
        } else if s % 60 == 0 {
            write!(f, "{}m", s / 60)
        } else {
            write!(f, "{s}s")
        }
    }
}

impl TryFrom<u64> for Interval {
    type Error = IntervalParseError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::from_seconds(value).ok_or_else(|| IntervalParseError(value.to_string()))
    }
}

impl From<Interval> for u64 {
    fn from(value: Interval) -> Self {
        value.0
    }
}

impl FromStr for Interval {
    type Err = IntervalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || IntervalParseError(s.to_string());
        let lower = s.trim().to_lowercase();
        if lower.is_empty() {
            return Err(err());
        }

        // m1 / h4 / d1 spellings
        let unit_first = ["s", "m", "h", "d"].into_iter().find_map(|u| {
            lower
                .strip_prefix(u)
                .filter(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
                .map(|rest| (u.to_string(), rest.to_string()))
        });
        let (unit, digits) = unit_first.unwrap_or_else(|| {
            let split = lower
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(lower.len());
            let (digits, unit) = lower.split_at(split);
            (unit.to_string(), digits.to_string())
        });

        let count: u64 = digits.parse().map_err(|_| err())?;
        let multiplier = match unit.as_str() {
            "" | "s" | "sec" => 1,
            "m" | "min" => 60,
            "h" | "hour" => 3600,
            "d" | "day" => 86_400,
            _ => return Err(err()),
        };
        Self::from_seconds(count.saturating_mul(multiplier)).ok_or_else(err)
    }
}

/// Error returned when parsing an invalid interval string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalParseError(String);

impl std::fmt::Display for IntervalParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid interval '{}', expected seconds or a value like 30s, 5m, 1h, 1d",
            self.0
        )
    }
}

impl std::error::Error for IntervalParseError {}
