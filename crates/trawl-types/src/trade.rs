//! Canonical trade representation.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Aggressor side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Taker bought.
    Buy,
    /// Taker sold.
    Sell,
    /// Exchange did not report a side.
    #[default]
    Unknown,
}

impl Side {
    /// Returns the side as the lowercase string stored on disk.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Unknown => "unknown",
        }
    }

    /// Returns true for [`Side::Buy`].
    #[must_use]
    pub const fn is_buy(&self) -> bool {
        matches!(self, Self::Buy)
    }

    /// Returns true for [`Side::Sell`].
    #[must_use]
    pub const fn is_sell(&self) -> bool {
        matches!(self, Self::Sell)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Side {
    type Err = SideParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" | "b" => Ok(Self::Buy),
            "sell" | "s" => Ok(Self::Sell),
            "" | "unknown" => Ok(Self::Unknown),
            _ => Err(SideParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an invalid side string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideParseError(String);

impl std::fmt::Display for SideParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid trade side '{}', expected buy or sell", self.0)
    }
}

impl std::error::Error for SideParseError {}

/// A single executed trade, normalized across exchanges.
///
/// Per pair, stored trades are non-decreasing in `timestamp`. Where the
/// exchange provides a `sequence` it is unique and strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Instrument identifier as the exchange spells it.
    pub pair: String,
    /// Exchange-assigned trade id, when the exchange has one.
    pub sequence: Option<u64>,
    /// Execution time in UNIX seconds (UTC).
    pub timestamp: i64,
    /// Execution price.
    pub price: f64,
    /// Base-asset quantity.
    pub size: f64,
    /// Aggressor side.
    pub side: Side,
    /// Exchange-specific pass-through columns, in schema order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<(String, String)>,
}

impl Trade {
    /// Creates a trade without pass-through columns.
    #[must_use]
    pub fn new(
        pair: impl Into<String>,
        sequence: Option<u64>,
        timestamp: i64,
        price: f64,
        size: f64,
        side: Side,
    ) -> Self {
        Self {
            pair: pair.into(),
            sequence,
            timestamp,
            price,
            size,
            side,
            extra: Vec::new(),
        }
    }

    /// Attaches a pass-through column.
    #[must_use]
    pub fn with_extra(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }

    /// Returns the trade notional (`price * size`).
    #[must_use]
    pub fn notional(&self) -> f64 {
        self.price * self.size
    }

    /// Looks up a pass-through column by name.
    #[must_use]
    pub fn extra_value(&self, name: &str) -> Option<&str> {
        self.extra
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns true if both trades carry the same payload.
    ///
    /// Used to recognise re-delivered trades on exchanges without ids.
    #[must_use]
    pub fn same_payload(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
            && self.price == other.price
            && self.size == other.size
            && self.side == other.side
            && self.extra == other.extra
    }
}
