//! Supported exchanges.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Exchange with a public historical-trades API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    /// Coinbase (formerly GDAX).
    #[serde(alias = "gdax")]
    Coinbase,
    /// Kraken.
    Kraken,
    /// Binance spot.
    Binance,
    /// BitMEX derivatives.
    Bitmex,
    /// Poloniex.
    Poloniex,
}

impl Exchange {
    /// Returns the exchange as a string identifier.
    ///
    /// This is also the name of the exchange's storage directory.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Coinbase => "coinbase",
            Self::Kraken => "kraken",
            Self::Binance => "binance",
            Self::Bitmex => "bitmex",
            Self::Poloniex => "poloniex",
        }
    }

    /// Returns all supported exchanges.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Coinbase,
            Self::Kraken,
            Self::Binance,
            Self::Bitmex,
            Self::Poloniex,
        ]
    }
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = ExchangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "coinbase" | "gdax" => Ok(Self::Coinbase),
            "kraken" => Ok(Self::Kraken),
            "binance" => Ok(Self::Binance),
            "bitmex" => Ok(Self::Bitmex),
            "poloniex" => Ok(Self::Poloniex),
            _ => Err(ExchangeParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown exchange name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeParseError(String);

impl std::fmt::Display for ExchangeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown exchange '{}', expected one of: coinbase, kraken, binance, bitmex, poloniex",
            self.0
        )
    }
}

impl std::error::Error for ExchangeParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_parse() {
        assert_eq!("GDAX".parse::<Exchange>().unwrap(), Exchange::Coinbase);
        assert_eq!("kraken".parse::<Exchange>().unwrap(), Exchange::Kraken);
        assert!("mtgox".parse::<Exchange>().is_err());
    }

    #[test]
    fn test_serde_alias() {
        let ex: Exchange = serde_json::from_str("\"gdax\"").unwrap();
        assert_eq!(ex, Exchange::Coinbase);
        assert_eq!(serde_json::to_string(&Exchange::Bitmex).unwrap(), "\"bitmex\"");
    }
}
