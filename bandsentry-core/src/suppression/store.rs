//! Persistence boundary for last-signal records.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::RwLock;

use thiserror::Error;

use crate::domain::LastSignalRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("state file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize state: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Keyed last-signal state, one record per instrument.
///
/// A missing key is a valid "no prior signal" state, not an error.
pub trait SignalStore: Send + Sync {
    fn load(&self, instrument: &str) -> Result<Option<LastSignalRecord>, StoreError>;

    /// Insert or replace the record for `record.instrument`.
    fn store(&self, record: &LastSignalRecord) -> Result<(), StoreError>;

    fn load_all(&self) -> Result<BTreeMap<String, LastSignalRecord>, StoreError>;
}

/// In-process store. Backtests start from an empty one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, LastSignalRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SignalStore for MemoryStore {
    fn load(&self, instrument: &str) -> Result<Option<LastSignalRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records.get(instrument).cloned())
    }

    fn store(&self, record: &LastSignalRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        records.insert(record.instrument.clone(), record.clone());
        Ok(())
    }

    fn load_all(&self) -> Result<BTreeMap<String, LastSignalRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use chrono::{TimeZone, Utc};

    fn record(instrument: &str, side: Side) -> LastSignalRecord {
        LastSignalRecord {
            instrument: instrument.into(),
            side,
            timestamp: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn missing_key_is_none() {
        let store = MemoryStore::new();
        assert!(store.load("BTC-USD").unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn store_replaces_record() {
        let store = MemoryStore::new();
        store.store(&record("BTC-USD", Side::Buy)).unwrap();
        store.store(&record("BTC-USD", Side::Sell)).unwrap();
        store.store(&record("ETH-USD", Side::Buy)).unwrap();
        assert_eq!(store.load("BTC-USD").unwrap().unwrap().side, Side::Sell);
        let all = store.load_all().unwrap();
        assert_eq!(
            all.keys().cloned().collect::<Vec<_>>(),
            vec!["BTC-USD".to_string(), "ETH-USD".to_string()]
        );
    }
}
