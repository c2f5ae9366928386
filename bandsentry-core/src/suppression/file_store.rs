//! JSON file store: `{ "<instrument>": { instrument, side, timestamp }, ... }`.
//!
//! The whole map is rewritten on every store. Writes go to a sibling `.tmp`
//! file and are renamed into place, so a reader never sees a half-written
//! file. A missing file is an empty state; an unparseable one is an error.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::store::{SignalStore, StoreError};
use crate::domain::LastSignalRecord;

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles on the file.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, LastSignalRecord>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write_map(&self, map: &BTreeMap<String, LastSignalRecord>) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(map).map_err(StoreError::Serialize)?;
        let write_err = |source: io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, json).map_err(write_err)?;
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            write_err(e)
        })
    }
}

impl SignalStore for JsonFileStore {
    fn load(&self, instrument: &str) -> Result<Option<LastSignalRecord>, StoreError> {
        Ok(self.read_map()?.remove(instrument))
    }

    fn store(&self, record: &LastSignalRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut map = self.read_map()?;
        map.insert(record.instrument.clone(), record.clone());
        self.write_map(&map)
    }

    fn load_all(&self) -> Result<BTreeMap<String, LastSignalRecord>, StoreError> {
        self.read_map()
    }
}
