//! In-memory tick store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use trawl_types::Trade;

use crate::{StoreError, TickStore, check_order, trailing_run};

/// Tick store holding every pair's log in memory.
#[derive(Debug, Default)]
pub struct MemoryTickStore {
    logs: Mutex<HashMap<String, Vec<Trade>>>,
}

impl MemoryTickStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything stored for the pair.
    pub async fn snapshot(&self, pair: &str) -> Vec<Trade> {
        self.logs.lock().await.get(pair).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl TickStore for MemoryTickStore {
    async fn exists(&self, pair: &str) -> Result<bool, StoreError> {
        Ok(self.logs.lock().await.contains_key(pair))
    }

    async fn append(&self, pair: &str, trades: &[Trade]) -> Result<(), StoreError> {
        if trades.is_empty() {
            return Ok(());
        }
        let mut logs = self.logs.lock().await;
        check_order(pair, logs.get(pair).and_then(|log| log.last()), trades)?;
        logs.entry(pair.to_string()).or_default().extend_from_slice(trades);
        Ok(())
    }

    async fn last_run(&self, pair: &str) -> Result<Vec<Trade>, StoreError> {
        Ok(self
            .logs
            .lock()
            .await
            .get(pair)
            .map(|log| trailing_run(log))
            .unwrap_or_default())
    }

    async fn range(&self, pair: &str, start: i64, end: i64) -> Result<Vec<Trade>, StoreError> {
        Ok(self
            .logs
            .lock()
            .await
            .get(pair)
            .map(|log| {
                log.iter()
                    .skip_while(|t| t.timestamp < start)
                    .take_while(|t| t.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn len(&self, pair: &str) -> Result<usize, StoreError> {
        Ok(self.logs.lock().await.get(pair).map_or(0, Vec::len))
    }
}
