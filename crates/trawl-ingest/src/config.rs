//! Ingestion configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use trawl_catalog::PairCatalog;
use trawl_fetch::{ClientConfig, ExchangeAdapter, RetryPolicy};
use trawl_types::Exchange;

use crate::IngestError;

/// Default number of units ingested at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Per-exchange connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    /// Overrides the adapter's default REST base URL.
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 600,
        }
    }
}

/// Immutable configuration for an [`crate::IngestionCoordinator`].
///
/// Every field has a default, so a config file only needs the keys it
/// changes:
///
/// ```json
/// { "data_dir": "/var/lib/trawl", "concurrency": 8,
///   "retry": { "max_attempts": 10 },
///   "exchanges": { "kraken": { "timeout_secs": 30 } } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrawlConfig {
    /// Root directory holding one subdirectory per exchange.
    pub data_dir: PathBuf,
    /// Units ingested at once by `ingest_all`.
    pub concurrency: usize,
    /// Retry policy shared by every fetch.
    pub retry: RetryPolicy,
    /// Connection settings keyed by exchange.
    pub exchanges: BTreeMap<Exchange, ExchangeSettings>,
    /// Pair catalog replacing the embedded one.
    pub pairs_file: Option<PathBuf>,
}

impl Default for TrawlConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            exchanges: BTreeMap::new(),
            pairs_file: None,
        }
    }
}

impl TrawlConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| IngestError::ReadConfig {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| IngestError::ParseConfig {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Returns the platform data directory, falling back to `~/.trawl`.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        ProjectDirs::from("", "", "trawl")
            .map_or_else(dirs_fallback, |p| p.data_dir().to_path_buf())
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Sets the default concurrency.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the settings for an exchange, or the defaults.
    #[must_use]
    pub fn exchange(&self, exchange: Exchange) -> ExchangeSettings {
        self.exchanges.get(&exchange).cloned().unwrap_or_default()
    }

    /// Returns the directory holding an exchange's logs.
    #[must_use]
    pub fn store_dir(&self, exchange: Exchange) -> PathBuf {
        self.data_dir.join(exchange.as_str())
    }

    /// Builds the HTTP client configuration for an adapter's exchange.
    #[must_use]
    pub fn client_config(&self, adapter: &dyn ExchangeAdapter) -> ClientConfig {
        let settings = self.exchange(adapter.exchange());
        ClientConfig {
            timeout: Duration::from_secs(settings.timeout_secs),
            ..ClientConfig::new(
                settings
                    .base_url
                    .unwrap_or_else(|| adapter.default_base_url().to_string()),
            )
        }
    }

    /// Loads the pair catalog: `pairs_file` if set, else the embedded one.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read or parsed.
    pub fn catalog(&self) -> Result<PairCatalog, IngestError> {
        let catalog = match &self.pairs_file {
            Some(path) => PairCatalog::from_file(path)?,
            None => PairCatalog::embedded()?,
        };
        Ok(catalog)
    }
}

fn dirs_fallback() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".trawl")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use trawl_fetch::adapter_for;

    #[test]
    fn test_defaults() {
        let config = TrawlConfig::default();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.retry.max_attempts, 100);
        assert_eq!(config.exchange(Exchange::Kraken).timeout_secs, 600);
        assert!(config.pairs_file.is_none());
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trawl.json");
        std::fs::write(
            &path,
            r#"{ "data_dir": "/tmp/ticks", "retry": { "max_attempts": 7 },
                 "exchanges": { "gdax": { "base_url": "http://localhost:9000", "timeout_secs": 5 } } }"#,
        )
        .unwrap();

        let config = TrawlConfig::from_file(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/ticks"));
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.retry.max_attempts, 7);
        assert_eq!(config.retry.base_delay_ms, 3_000);
        assert_eq!(config.store_dir(Exchange::Coinbase), PathBuf::from("/tmp/ticks/coinbase"));

        let client = config.client_config(adapter_for(Exchange::Coinbase).as_ref());
        assert_eq!(client.base_url, "http://localhost:9000");
        assert_eq!(client.timeout, Duration::from_secs(5));

        let client = config.client_config(adapter_for(Exchange::Binance).as_ref());
        assert_eq!(client.base_url, adapter_for(Exchange::Binance).default_base_url());
    }

    #[test]
    fn test_bad_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            TrawlConfig::from_file(&missing),
            Err(IngestError::ReadConfig { .. })
        ));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ concurrency: 2").unwrap();
        assert!(matches!(
            TrawlConfig::from_file(&broken),
            Err(IngestError::ParseConfig { .. })
        ));
    }

    #[test]
    fn test_pairs_file_catalog() {
        let dir = TempDir::new().unwrap();
        let pairs = dir.path().join("pairs.json");
        std::fs::write(&pairs, r#"{ "poloniex": ["BTC_ETH"] }"#).unwrap();

        let config = TrawlConfig {
            pairs_file: Some(pairs),
            ..TrawlConfig::default()
        };
        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.contains(Exchange::Poloniex, "BTC_ETH"));
    }
}
