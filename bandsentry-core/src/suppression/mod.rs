//! Duplicate suppression: emit a signal only when the side changes.
//!
//! Per-instrument state machine over {NONE, BUY, SELL}:
//!
//! ```text
//! NONE --BUY--> BUY      NONE --SELL--> SELL
//! BUY  --SELL-> SELL     SELL --BUY---> BUY
//! BUY  --BUY--> (suppressed)   SELL --SELL--> (suppressed)
//! ```
//!
//! NONE is only the initial state. The store is passed in by handle, and each
//! instrument's load-decide-store cycle runs under its own lock so different
//! instruments can be submitted from different threads.
//!
//! `submit` decides and records in one step. `check` and `commit` split the
//! two so a caller can publish a signal before the store marks it as sent.

pub mod file_store;
pub mod store;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{LastSignalRecord, Signal};

pub use file_store::JsonFileStore;
pub use store::{MemoryStore, SignalStore, StoreError};

/// Result of submitting one signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum SuppressionVerdict {
    /// Novel side.
    Emitted,
    /// Same side as the last emission; state unchanged.
    Suppressed { previous: LastSignalRecord },
}

impl SuppressionVerdict {
    pub fn is_emitted(&self) -> bool {
        matches!(self, Self::Emitted)
    }
}

pub struct DuplicateSuppressor<S: SignalStore> {
    store: S,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: SignalStore> std::fmt::Debug for DuplicateSuppressor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateSuppressor").finish_non_exhaustive()
    }
}

impl<S: SignalStore> DuplicateSuppressor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn instrument_lock(&self, instrument: &str) -> Result<Arc<Mutex<()>>, StoreError> {
        let mut locks = self.locks.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(Arc::clone(
            locks
                .entry(instrument.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        ))
    }

    /// Decide whether `signal` is novel without recording it.
    ///
    /// Pair with [`commit`](Self::commit) once the signal has been published.
    pub fn check(&self, signal: &Signal) -> Result<SuppressionVerdict, StoreError> {
        let lock = self.instrument_lock(&signal.instrument)?;
        let _guard = lock.lock().map_err(|_| StoreError::Poisoned)?;
        self.verdict(signal)
    }

    /// Record `signal` as its instrument's last emission.
    pub fn commit(&self, signal: &Signal) -> Result<(), StoreError> {
        let lock = self.instrument_lock(&signal.instrument)?;
        let _guard = lock.lock().map_err(|_| StoreError::Poisoned)?;
        self.store.store(&LastSignalRecord::from_signal(signal))
    }

    /// Decide whether `signal` is novel, and record it if so.
    pub fn submit(&self, signal: &Signal) -> Result<SuppressionVerdict, StoreError> {
        let lock = self.instrument_lock(&signal.instrument)?;
        let _guard = lock.lock().map_err(|_| StoreError::Poisoned)?;

        let verdict = self.verdict(signal)?;
        if verdict.is_emitted() {
            self.store.store(&LastSignalRecord::from_signal(signal))?;
        }
        Ok(verdict)
    }

    // Caller holds the instrument lock.
    fn verdict(&self, signal: &Signal) -> Result<SuppressionVerdict, StoreError> {
        if let Some(previous) = self.store.load(&signal.instrument)? {
            if previous.side == signal.side {
                debug!(
                    instrument = %signal.instrument,
                    side = %signal.side,
                    since = %previous.timestamp,
                    "suppressed duplicate signal"
                );
                return Ok(SuppressionVerdict::Suppressed { previous });
            }
        }
        Ok(SuppressionVerdict::Emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use chrono::{Duration, TimeZone, Utc};

    fn signal(side: Side, minute: i64) -> Signal {
        Signal {
            instrument: "BTC-USD".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap() + Duration::minutes(minute),
            side,
            price: 100.0,
            confidence: 0.9,
            stop_price: 97.0,
            target_price: 103.0,
        }
    }

    #[test]
    fn same_side_twice_emits_then_suppresses() {
        let suppressor = DuplicateSuppressor::new(MemoryStore::new());
        assert_eq!(
            suppressor.submit(&signal(Side::Buy, 0)).unwrap(),
            SuppressionVerdict::Emitted
        );
        let second = suppressor.submit(&signal(Side::Buy, 30)).unwrap();
        match second {
            SuppressionVerdict::Suppressed { previous } => {
                assert_eq!(previous.timestamp, signal(Side::Buy, 0).timestamp);
            }
            other => panic!("expected suppression, got {other:?}"),
        }
        // Suppression leaves the stored timestamp alone.
        let stored = suppressor.store().load("BTC-USD").unwrap().unwrap();
        assert_eq!(stored.timestamp, signal(Side::Buy, 0).timestamp);
    }

    #[test]
    fn alternating_sides_all_emit() {
        let suppressor = DuplicateSuppressor::new(MemoryStore::new());
        for (i, side) in [Side::Buy, Side::Sell, Side::Buy].into_iter().enumerate() {
            let verdict = suppressor.submit(&signal(side, i as i64 * 30)).unwrap();
            assert!(verdict.is_emitted(), "submission {i} should emit");
        }
        let stored = suppressor.store().load("BTC-USD").unwrap().unwrap();
        assert_eq!(stored.side, Side::Buy);
        assert_eq!(stored.timestamp, signal(Side::Buy, 60).timestamp);
    }

    #[test]
    fn instruments_are_independent() {
        let suppressor = DuplicateSuppressor::new(MemoryStore::new());
        let mut eth = signal(Side::Sell, 0);
        eth.instrument = "ETH-USD".into();
        assert!(suppressor.submit(&signal(Side::Sell, 0)).unwrap().is_emitted());
        assert!(suppressor.submit(&eth).unwrap().is_emitted());
    }

    #[test]
    fn check_leaves_state_until_commit() {
        let suppressor = DuplicateSuppressor::new(MemoryStore::new());
        let sell = signal(Side::Sell, 0);
        assert!(suppressor.check(&sell).unwrap().is_emitted());
        assert!(suppressor.check(&sell).unwrap().is_emitted());
        assert!(suppressor.store().load("BTC-USD").unwrap().is_none());

        suppressor.commit(&sell).unwrap();
        assert!(matches!(
            suppressor.check(&signal(Side::Sell, 30)).unwrap(),
            SuppressionVerdict::Suppressed { .. }
        ));
        assert!(suppressor.check(&signal(Side::Buy, 30)).unwrap().is_emitted());
    }

    #[test]
    fn concurrent_submissions_emit_once_per_instrument() {
        let suppressor = Arc::new(DuplicateSuppressor::new(MemoryStore::new()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let suppressor = Arc::clone(&suppressor);
                std::thread::spawn(move || suppressor.submit(&signal(Side::Sell, 0)).unwrap())
            })
            .collect();
        let emitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(SuppressionVerdict::is_emitted)
            .count();
        assert_eq!(emitted, 1);
    }
}
