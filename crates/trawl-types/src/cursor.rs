//! Pagination cursors.

use serde::{Deserialize, Serialize};

/// Resumption point for a paginated trade history.
///
/// Every variant is inclusive: it names the first trade the downloader
/// still wants. Adapters translate this into whatever inclusive or
/// exclusive convention their exchange uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Cursor {
    /// First wanted trade id or row offset.
    Sequence(u64),
    /// First wanted second (UNIX, UTC).
    Time(i64),
    /// Explicit time window, both ends inclusive.
    Window {
        /// Window start (UNIX seconds).
        start: i64,
        /// Window end (UNIX seconds).
        end: i64,
    },
    /// Opaque continuation token handed out by the exchange.
    Token(String),
}

impl Cursor {
    /// Returns the earliest second this cursor can yield, if it is time based.
    #[must_use]
    pub fn time_hint(&self) -> Option<i64> {
        match self {
            Self::Time(t) => Some(*t),
            Self::Window { start, .. } => Some(*start),
            Self::Sequence(_) => None,
            // Kraken tokens are nanosecond timestamps.
            Self::Token(token) => token.parse::<i128>().ok().map(|ns| (ns / 1_000_000_000) as i64),
        }
    }

    /// Returns the sequence number for sequence cursors.
    #[must_use]
    pub const fn sequence(&self) -> Option<u64> {
        match self {
            Self::Sequence(n) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequence(n) => write!(f, "seq:{n}"),
            Self::Time(t) => write!(f, "time:{t}"),
            Self::Window { start, end } => write!(f, "window:{start}..{end}"),
            Self::Token(token) => write!(f, "token:{token}"),
        }
    }
}
