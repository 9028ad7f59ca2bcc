use std::fs;
use std::path::PathBuf;

use crate::errors::StoreError;
use crate::models::PersistedRates;

/// Fixed logical key under which the latest snapshot's rate map lives.
/// Only one map survives a restart; this is a baseline, not an append log.
pub const PREVIOUS_RATES_KEY: &str = "previous_funding_rates";

/// Key-value persistence for the ranking baseline. Absent or unreadable
/// data is reported as `None`, never as an error.
pub trait SnapshotStore: Send + Sync {
    fn put(&self, key: &str, value: &PersistedRates) -> Result<(), StoreError>;

    fn get(&self, key: &str) -> Option<PersistedRates>;
}

/// JSON files under a data directory, one file per key.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SnapshotStore for FileStore {
    fn put(&self, key: &str, value: &PersistedRates) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_vec(value)?;
        fs::write(self.path(key), json)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Option<PersistedRates> {
        let raw = fs::read(self.path(key)).ok()?;
        match serde_json::from_slice(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("discarding unreadable snapshot under {key:?}: {e}");
                None
            }
        }
    }
}

/// Keeps everything in a mutex-guarded map; used by tests.
#[cfg(test)]
pub struct MemoryStore {
    inner: std::sync::Mutex<std::collections::HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }
}

#[cfg(test)]
impl SnapshotStore for MemoryStore {
    fn put(&self, key: &str, value: &PersistedRates) -> Result<(), StoreError> {
        let json = serde_json::to_string(value)?;
        self.inner.lock().unwrap().insert(key.to_string(), json);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<PersistedRates> {
        let guard = self.inner.lock().unwrap();
        let raw = guard.get(key)?;
        serde_json::from_str(raw).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "fundwatch-store-{label}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn sample_rates() -> PersistedRates {
        let mut rates = HashMap::new();
        rates.insert("BTCUSDT".to_string(), 0.0001);
        rates.insert("ETHUSDT".to_string(), -0.0002);
        PersistedRates {
            timestamp_ms: 1_700_000_000_000,
            rates,
        }
    }

    #[test]
    fn file_store_round_trips_rates_and_timestamp() {
        let dir = scratch_dir("roundtrip");
        let store = FileStore::new(&dir);

        store.put(PREVIOUS_RATES_KEY, &sample_rates()).unwrap();
        let loaded = store.get(PREVIOUS_RATES_KEY).unwrap();

        assert_eq!(loaded.timestamp_ms, 1_700_000_000_000);
        assert_eq!(loaded.rates.get("BTCUSDT"), Some(&0.0001));
        assert_eq!(loaded.rates.len(), 2);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn absent_key_reads_as_none() {
        let dir = scratch_dir("absent");
        let store = FileStore::new(&dir);

        assert!(store.get("never_written").is_none());
    }

    #[test]
    fn corrupt_file_reads_as_none() {
        let dir = scratch_dir("corrupt");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{PREVIOUS_RATES_KEY}.json")), b"{not json").unwrap();

        let store = FileStore::new(&dir);
        assert!(store.get(PREVIOUS_RATES_KEY).is_none());

        let _ = fs::remove_dir_all(&dir);
    }
}
