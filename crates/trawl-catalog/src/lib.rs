//! Exchange pair catalog for the trawl trade-tick ingester.
//!
//! The catalog is an immutable value: load it once and pass it to
//! whatever needs it.
//!
//! # Example
//!
//! ```
//! use trawl_catalog::PairCatalog;
//! use trawl_types::Exchange;
//!
//! let catalog = PairCatalog::embedded().unwrap();
//! assert!(catalog.contains(Exchange::Coinbase, "BTC-USD"));
//! ```

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/trawl/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::path::Path;

use trawl_types::{Exchange, TrawlError};

/// The default pair list embedded at compile time.
const PAIRS_JSON: &str = include_str!("../data/pairs.json");

/// Supported pairs per exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairCatalog {
    pairs: BTreeMap<Exchange, Vec<String>>,
}

impl PairCatalog {
    /// Creates a catalog from an explicit mapping.
    #[must_use]
    pub const fn new(pairs: BTreeMap<Exchange, Vec<String>>) -> Self {
        Self { pairs }
    }

    /// Loads the embedded default catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded JSON is malformed.
    pub fn embedded() -> Result<Self, TrawlError> {
        Self::from_json(PAIRS_JSON)
    }

    /// Parses a catalog from JSON of the form `{"exchange": ["PAIR", ...]}`.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON or unknown exchange names.
    pub fn from_json(json: &str) -> Result<Self, TrawlError> {
        let pairs: BTreeMap<Exchange, Vec<String>> = serde_json::from_str(json)?;
        Ok(Self { pairs })
    }

    /// Reads a catalog from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TrawlError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Returns the pairs configured for an exchange.
    #[must_use]
    pub fn pairs(&self, exchange: Exchange) -> &[String] {
        self.pairs.get(&exchange).map_or(&[], Vec::as_slice)
    }

    /// Returns true if the exchange lists the pair.
    #[must_use]
    pub fn contains(&self, exchange: Exchange, pair: &str) -> bool {
        self.pairs(exchange).iter().any(|p| p == pair)
    }

    /// Checks that the pair is listed, returning a typed error otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`TrawlError::UnknownPair`] if the pair is not listed.
    pub fn require(&self, exchange: Exchange, pair: &str) -> Result<(), TrawlError> {
        if self.contains(exchange, pair) {
            Ok(())
        } else {
            Err(TrawlError::UnknownPair {
                exchange: exchange.to_string(),
                pair: pair.to_string(),
            })
        }
    }

    /// Returns the exchanges that have at least one pair.
    pub fn exchanges(&self) -> impl Iterator<Item = Exchange> + '_ {
        self.pairs
            .iter()
            .filter(|(_, pairs)| !pairs.is_empty())
            .map(|(exchange, _)| *exchange)
    }

    /// Returns every (exchange, pair) unit in exchange order.
    pub fn units(&self) -> impl Iterator<Item = (Exchange, &str)> {
        self.pairs
            .iter()
            .flat_map(|(exchange, pairs)| pairs.iter().map(move |p| (*exchange, p.as_str())))
    }

    /// Returns the total number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.values().map(Vec::len).sum()
    }

    /// Returns true if no pair is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Searches pairs by substring (case-insensitive).
    #[must_use]
    pub fn search(&self, pattern: &str) -> Vec<(Exchange, &str)> {
        let pattern = pattern.to_lowercase();
        self.units()
            .filter(|(_, pair)| pair.to_lowercase().contains(&pattern))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_loads() {
        let catalog = PairCatalog::embedded().unwrap();
        assert!(!catalog.is_empty());
        assert_eq!(catalog.exchanges().count(), Exchange::all().len());
    }

    #[test]
    fn test_lookup() {
        let catalog = PairCatalog::embedded().unwrap();
        assert!(catalog.contains(Exchange::Kraken, "XXBTZUSD"));
        assert!(!catalog.contains(Exchange::Kraken, "BTC-USD"));
        assert!(catalog.require(Exchange::Bitmex, "XBTUSD").is_ok());
        assert!(matches!(
            catalog.require(Exchange::Bitmex, "DOGE"),
            Err(TrawlError::UnknownPair { .. })
        ));
    }

    #[test]
    fn test_gdax_alias_and_units() {
        let catalog = PairCatalog::from_json(r#"{"gdax": ["BTC-USD"], "kraken": []}"#).unwrap();
        let units: Vec<_> = catalog.units().collect();
        assert_eq!(units, vec![(Exchange::Coinbase, "BTC-USD")]);
        assert_eq!(catalog.exchanges().count(), 1);
    }

    #[test]
    fn test_unknown_exchange_rejected() {
        assert!(PairCatalog::from_json(r#"{"mtgox": ["BTCUSD"]}"#).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.json");
        std::fs::write(&path, r#"{"binance": ["ETHBTC"]}"#).unwrap();
        let catalog = PairCatalog::from_file(&path).unwrap();
        assert_eq!(catalog.pairs(Exchange::Binance), ["ETHBTC".to_string()]);
        assert_eq!(catalog.search("eth"), vec![(Exchange::Binance, "ETHBTC")]);
    }
}
