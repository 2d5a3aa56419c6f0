//! CSV-backed tick store.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use csv_async::{AsyncReaderBuilder, AsyncWriterBuilder, StringRecord};
use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, trace, warn};
use trawl_types::{Side, Trade, time};

use crate::{StoreError, TickStore, check_order, trailing_run};

/// Columns every log starts with, before exchange pass-through columns.
pub const BASE_COLUMNS: [&str; 6] = ["date", "time", "trade_id", "price", "size", "side"];

/// Header presence and the offset of a torn last record, if any.
#[derive(Debug, Default)]
struct ScanEnd {
    has_header: bool,
    torn_at: Option<u64>,
}

/// Cached tail of one pair's log.
#[derive(Debug, Default)]
struct PairState {
    loaded: bool,
    has_header: bool,
    len: usize,
    run: Vec<Trade>,
}

/// Tick store writing one CSV file per pair under an exchange directory.
///
/// File layout: `<root>/<pair>.csv`, header
/// `date,time,trade_id,price,size,side,<extras...>`. The header is
/// written by the first append; later appends must use the same columns.
///
/// A last record left unterminated or short by an interrupted append is
/// dropped from the file when the log is first loaded.
#[derive(Debug)]
pub struct CsvTickStore {
    root: PathBuf,
    extra_columns: Vec<String>,
    pairs: Mutex<HashMap<String, Arc<tokio::sync::Mutex<PairState>>>>,
}

impl CsvTickStore {
    /// Creates a store rooted at `root` with the given pass-through columns.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, extra_columns: Vec<String>) -> Self {
        Self {
            root: root.into(),
            extra_columns,
            pairs: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the store's directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path of a pair's log file.
    #[must_use]
    pub fn path_for(&self, pair: &str) -> PathBuf {
        self.root.join(format!("{}.csv", pair.replace(['/', '\\'], "_")))
    }

    /// Returns the full header for this store.
    #[must_use]
    pub fn header(&self) -> Vec<String> {
        BASE_COLUMNS
            .iter()
            .map(ToString::to_string)
            .chain(self.extra_columns.iter().cloned())
            .collect()
    }

    fn pair_lock(&self, pair: &str) -> Arc<tokio::sync::Mutex<PairState>> {
        let mut pairs = self.pairs.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(pairs.entry(pair.to_string()).or_default())
    }

    /// Scans the log once to populate the cached tail.
    async fn load(&self, pair: &str, state: &mut PairState) -> Result<(), StoreError> {
        if state.loaded {
            return Ok(());
        }
        let path = self.path_for(pair);
        if tokio::fs::try_exists(&path).await? {
            trim_unterminated(pair, &path).await?;
            let mut len = 0;
            let mut run: Vec<Trade> = Vec::new();
            let end = self
                .scan(pair, &path, |trade| {
                    len += 1;
                    if run.last().is_some_and(|t| t.timestamp != trade.timestamp) {
                        run.clear();
                    }
                    run.push(trade);
                    true
                })
                .await?;
            if let Some(offset) = end.torn_at {
                warn!(pair, offset, "dropping short last record");
                truncate(&path, offset).await?;
            }
            state.len = len;
            state.run = run;
            state.has_header = end.has_header;
            debug!(pair, records = len, "loaded tick log tail");
        }
        state.loaded = true;
        Ok(())
    }

    /// Streams every record of a log through `visit` until it returns false.
    ///
    /// A record with the wrong number of columns is tolerated only as the
    /// last one in the file; its byte offset is reported in `torn_at`.
    async fn scan<F>(&self, pair: &str, path: &Path, mut visit: F) -> Result<ScanEnd, StoreError>
    where
        F: FnMut(Trade) -> bool,
    {
        let file = tokio::fs::File::open(path).await?;
        let mut reader = AsyncReaderBuilder::new().flexible(true).create_reader(file);
        let headers = reader.headers().await?.clone();
        if headers.is_empty() {
            return Ok(ScanEnd::default());
        }
        self.check_header(pair, &headers)?;

        let mut torn_at = None;
        let mut records = reader.records();
        while let Some(record) = records.next().await {
            let record = record?;
            if let Some(at) = torn_at {
                return Err(StoreError::Corrupt {
                    pair: pair.to_string(),
                    reason: format!("short record at byte {at} is followed by more data"),
                });
            }
            if record.len() != headers.len() {
                torn_at = Some(record.position().map_or(0, |p| p.byte()));
                continue;
            }
            if !visit(self.decode(pair, &record)?) {
                break;
            }
        }
        Ok(ScanEnd {
            has_header: true,
            torn_at,
        })
    }

    fn check_header(&self, pair: &str, headers: &StringRecord) -> Result<(), StoreError> {
        let expected = self.header();
        if headers.iter().ne(expected.iter().map(String::as_str)) {
            return Err(StoreError::SchemaMismatch {
                pair: pair.to_string(),
                expected,
                found: headers.iter().map(ToString::to_string).collect(),
            });
        }
        Ok(())
    }

    fn decode(&self, pair: &str, record: &StringRecord) -> Result<Trade, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            pair: pair.to_string(),
            reason,
        };
        let field = |i: usize| {
            record
                .get(i)
                .ok_or_else(|| corrupt(format!("missing column {}", i + 1)))
        };

        let timestamp = field(1)?
            .parse::<i64>()
            .map_err(|e| corrupt(format!("time: {e}")))?;
        let sequence = match field(2)? {
            "" => None,
            id => Some(id.parse::<u64>().map_err(|e| corrupt(format!("trade_id: {e}")))?),
        };
        let price = field(3)?
            .parse::<f64>()
            .map_err(|e| corrupt(format!("price: {e}")))?;
        let size = field(4)?
            .parse::<f64>()
            .map_err(|e| corrupt(format!("size: {e}")))?;
        let side = field(5)?
            .parse::<Side>()
            .map_err(|e| corrupt(e.to_string()))?;

        let mut extra = Vec::with_capacity(self.extra_columns.len());
        for (offset, name) in self.extra_columns.iter().enumerate() {
            extra.push((name.clone(), field(BASE_COLUMNS.len() + offset)?.to_string()));
        }

        Ok(Trade {
            pair: pair.to_string(),
            sequence,
            timestamp,
            price,
            size,
            side,
            extra,
        })
    }

    fn check_schema(&self, pair: &str, trades: &[Trade]) -> Result<(), StoreError> {
        for trade in trades {
            let names = trade.extra.iter().map(|(name, _)| name);
            if names.ne(self.extra_columns.iter()) {
                return Err(StoreError::SchemaMismatch {
                    pair: pair.to_string(),
                    expected: self.extra_columns.clone(),
                    found: trade.extra.iter().map(|(name, _)| name.clone()).collect(),
                });
            }
        }
        Ok(())
    }

    /// Encodes a batch (and the header, if needed) into one buffer.
    async fn encode(&self, trades: &[Trade], with_header: bool) -> Result<Vec<u8>, StoreError> {
        let mut writer = AsyncWriterBuilder::new()
            .has_headers(false)
            .create_writer(Vec::new());
        if with_header {
            writer.write_record(self.header()).await?;
        }
        for trade in trades {
            let mut record = vec![
                time::unix_to_iso(trade.timestamp),
                trade.timestamp.to_string(),
                trade.sequence.map(|s| s.to_string()).unwrap_or_default(),
                trade.price.to_string(),
                trade.size.to_string(),
                trade.side.as_str().to_string(),
            ];
            record.extend(trade.extra.iter().map(|(_, value)| value.clone()));
            writer.write_record(record).await?;
        }
        writer
            .into_inner()
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string())))
    }
}

async fn write_synced(file: &mut tokio::fs::File, buf: &[u8]) -> std::io::Result<()> {
    file.write_all(buf).await?;
    file.sync_data().await
}

async fn truncate(path: &Path, len: u64) -> Result<(), StoreError> {
    let file = tokio::fs::OpenOptions::new().write(true).open(path).await?;
    file.set_len(len).await?;
    file.sync_data().await?;
    Ok(())
}

/// Cuts the file back to its last newline.
async fn trim_unterminated(pair: &str, path: &Path) -> Result<(), StoreError> {
    let mut file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    let mut buf = vec![0_u8; 4096];
    let mut end = len;
    let keep = loop {
        if end == 0 {
            break 0;
        }
        let start = end.saturating_sub(buf.len() as u64);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start)).await?;
        file.read_exact(chunk).await?;
        if let Some(i) = chunk.iter().rposition(|&b| b == b'\n') {
            break start + i as u64 + 1;
        }
        end = start;
    };
    if keep < len {
        warn!(pair, dropped_bytes = len - keep, "dropping unterminated last record");
        truncate(path, keep).await?;
    }
    Ok(())
}

#[async_trait]
impl TickStore for CsvTickStore {
    async fn exists(&self, pair: &str) -> Result<bool, StoreError> {
        let lock = self.pair_lock(pair);
        let mut state = lock.lock().await;
        self.load(pair, &mut state).await?;
        Ok(state.has_header)
    }

    async fn append(&self, pair: &str, trades: &[Trade]) -> Result<(), StoreError> {
        if trades.is_empty() {
            return Ok(());
        }
        self.check_schema(pair, trades)?;

        let lock = self.pair_lock(pair);
        let mut state = lock.lock().await;
        self.load(pair, &mut state).await?;
        check_order(pair, state.run.last(), trades)?;

        let buf = self.encode(trades, !state.has_header).await?;
        tokio::fs::create_dir_all(&self.root).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(pair))
            .await?;
        let before = file.metadata().await?.len();
        if let Err(e) = write_synced(&mut file, &buf).await {
            // leave only whole records behind
            if let Err(undo) = file.set_len(before).await {
                warn!(pair, error = %undo, "could not roll back partial append");
            }
            return Err(e.into());
        }

        state.has_header = true;
        state.len += trades.len();
        let tail = trailing_run(trades);
        if state
            .run
            .last()
            .is_some_and(|t| tail.first().is_some_and(|f| f.timestamp == t.timestamp))
        {
            state.run.extend(tail);
        } else {
            state.run = tail;
        }
        trace!(pair, appended = trades.len(), total = state.len, "appended trades");
        Ok(())
    }

    async fn last_run(&self, pair: &str) -> Result<Vec<Trade>, StoreError> {
        let lock = self.pair_lock(pair);
        let mut state = lock.lock().await;
        self.load(pair, &mut state).await?;
        Ok(state.run.clone())
    }

    async fn range(&self, pair: &str, start: i64, end: i64) -> Result<Vec<Trade>, StoreError> {
        let lock = self.pair_lock(pair);
        let mut state = lock.lock().await;
        self.load(pair, &mut state).await?;
        if !state.has_header {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        self.scan(pair, &self.path_for(pair), |trade| {
            if trade.timestamp > end {
                return false;
            }
            if trade.timestamp >= start {
                out.push(trade);
            }
            true
        })
        .await?;
        Ok(out)
    }

    async fn len(&self, pair: &str) -> Result<usize, StoreError> {
        let lock = self.pair_lock(pair);
        let mut state = lock.lock().await;
        self.load(pair, &mut state).await?;
        Ok(state.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> CsvTickStore {
        CsvTickStore::new(dir.join("kraken"), vec!["order_type".to_string()])
    }

    fn trade(ts: i64, price: f64) -> Trade {
        Trade::new("XXBTZUSD", None, ts, price, 0.5, Side::Sell).with_extra("order_type", "l")
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        assert!(!store.exists("XXBTZUSD").await.unwrap());
        store
            .append("XXBTZUSD", &[trade(10, 100.0), trade(20, 101.5)])
            .await
            .unwrap();

        assert!(store.exists("XXBTZUSD").await.unwrap());
        assert_eq!(store.len("XXBTZUSD").await.unwrap(), 2);
        let last = store.last("XXBTZUSD").await.unwrap().unwrap();
        assert_eq!(last, trade(20, 101.5));

        let contents = std::fs::read_to_string(store.path_for("XXBTZUSD")).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("date,time,trade_id,price,size,side,order_type"));
        assert_eq!(
            lines.next(),
            Some("1970-01-01T00:00:10Z,10,,100,0.5,sell,l")
        );
    }

    #[tokio::test]
    async fn test_reopen_recovers_tail() {
        let dir = tempfile::tempdir().unwrap();
        store(dir.path())
            .append("XXBTZUSD", &[trade(10, 1.0), trade(20, 2.0), trade(20, 3.0)])
            .await
            .unwrap();

        let reopened = store(dir.path());
        assert_eq!(reopened.len("XXBTZUSD").await.unwrap(), 3);
        let run = reopened.last_run("XXBTZUSD").await.unwrap();
        assert_eq!(run, vec![trade(20, 2.0), trade(20, 3.0)]);

        reopened.append("XXBTZUSD", &[trade(30, 4.0)]).await.unwrap();
        let contents = std::fs::read_to_string(reopened.path_for("XXBTZUSD")).unwrap();
        assert_eq!(contents.lines().filter(|l| l.starts_with("date")).count(), 1);
    }

    #[tokio::test]
    async fn test_range_is_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let trades: Vec<_> = (0..10).map(|i| trade(i * 10, i as f64)).collect();
        store.append("XXBTZUSD", &trades).await.unwrap();

        let range = store.range("XXBTZUSD", 20, 50).await.unwrap();
        let times: Vec<i64> = range.iter().map(|t| t.timestamp).collect();
        assert_eq!(times, vec![20, 30, 40, 50]);
        assert!(store.range("missing", 0, 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_out_of_order_append() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.append("XXBTZUSD", &[trade(50, 1.0)]).await.unwrap();

        let err = store.append("XXBTZUSD", &[trade(40, 1.0)]).await.unwrap_err();
        assert!(matches!(err, StoreError::OutOfOrder { .. }));
        assert_eq!(store.len("XXBTZUSD").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rejects_schema_change() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let bare = Trade::new("XXBTZUSD", None, 1, 1.0, 1.0, Side::Buy);
        let err = store.append("XXBTZUSD", &[bare]).await.unwrap_err();
        assert!(matches!(err, StoreError::SchemaMismatch { .. }));

        store.append("XXBTZUSD", &[trade(1, 1.0)]).await.unwrap();
        let other = CsvTickStore::new(dir.path().join("kraken"), Vec::new());
        match other.len("XXBTZUSD").await {
            Err(StoreError::SchemaMismatch { expected, found, .. }) => {
                assert_eq!(expected, BASE_COLUMNS.map(String::from).to_vec());
                assert_eq!(found.last().map(String::as_str), Some("order_type"));
            }
            result => panic!("expected a schema mismatch, got {result:?}"),
        }
    }

    fn append_raw(store: &CsvTickStore, pair: &str, bytes: &str) {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(store.path_for(pair))
            .unwrap();
        file.write_all(bytes.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn test_unterminated_last_record_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        store(dir.path())
            .append("XXBTZUSD", &[trade(10, 1.0), trade(20, 2.0)])
            .await
            .unwrap();
        append_raw(&store(dir.path()), "XXBTZUSD", "1970-01-01T00:00:30Z,30,,3,0.5,se");

        let reopened = store(dir.path());
        assert_eq!(reopened.len("XXBTZUSD").await.unwrap(), 2);
        assert_eq!(reopened.last("XXBTZUSD").await.unwrap(), Some(trade(20, 2.0)));
        reopened.append("XXBTZUSD", &[trade(30, 3.0)]).await.unwrap();

        let again = store(dir.path());
        let all = again.range("XXBTZUSD", 0, 100).await.unwrap();
        assert_eq!(all, vec![trade(10, 1.0), trade(20, 2.0), trade(30, 3.0)]);
    }

    #[tokio::test]
    async fn test_short_last_record_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        store(dir.path())
            .append("XXBTZUSD", &[trade(10, 1.0)])
            .await
            .unwrap();
        append_raw(&store(dir.path()), "XXBTZUSD", "1970-01-01T00:00:11Z,11,2,1\n");

        let reopened = store(dir.path());
        assert_eq!(reopened.last("XXBTZUSD").await.unwrap(), Some(trade(10, 1.0)));
        reopened.append("XXBTZUSD", &[trade(12, 2.0)]).await.unwrap();
        assert_eq!(store(dir.path()).len("XXBTZUSD").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_short_record_inside_log_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        store(dir.path())
            .append("XXBTZUSD", &[trade(10, 1.0)])
            .await
            .unwrap();
        append_raw(
            &store(dir.path()),
            "XXBTZUSD",
            "1970-01-01T00:00:11Z,11,2,1\n1970-01-01T00:00:12Z,12,,2,0.5,sell,l\n",
        );

        assert!(matches!(
            store(dir.path()).len("XXBTZUSD").await,
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_sequence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvTickStore::new(dir.path(), Vec::new());
        let t = Trade::new("BTC-USD", Some(42), 7, 0.1 + 0.2, 3.0, Side::Buy);
        store.append("BTC-USD", std::slice::from_ref(&t)).await.unwrap();

        let reopened = CsvTickStore::new(dir.path(), Vec::new());
        assert_eq!(reopened.last("BTC-USD").await.unwrap(), Some(t));
    }
}
