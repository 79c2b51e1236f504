//! JSON state file standing in for the browser's localStorage.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use shared::storage::{KeyValueStore, StorageError};

pub const DEFAULT_STATE_FILE: &str = "sentinel-state.json";

/// Holds every key of the state file in memory and rewrites the whole file
/// on each save.
pub struct FileStore {
    path: PathBuf,
    entries: Map<String, Value>,
}

impl FileStore {
    /// Opens `path`, starting empty when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if !path.exists() {
            log::debug!("No state file at {}, starting empty", path.display());
            return Ok(Self {
                path,
                entries: Map::new(),
            });
        }

        let raw = fs::read_to_string(&path).map_err(|e| {
            StorageError::Backend(format!("failed to read {}: {}", path.display(), e))
        })?;
        let entries = if raw.trim().is_empty() {
            Map::new()
        } else {
            serde_json::from_str(&raw).map_err(|e| StorageError::Decode {
                key: path.display().to_string(),
                detail: e.to_string(),
            })?
        };

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::Backend(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }
        let raw = serde_json::to_string_pretty(&self.entries).map_err(|source| {
            StorageError::Encode {
                key: self.path.display().to_string(),
                source,
            }
        })?;
        fs::write(&self.path, raw).map_err(|e| {
            StorageError::Backend(format!("failed to write {}: {}", self.path.display(), e))
        })
    }
}

impl KeyValueStore for FileStore {
    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|e| StorageError::Decode {
                    key: key.to_string(),
                    detail: e.to_string(),
                }),
        }
    }

    fn save<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StorageError> {
        let value = serde_json::to_value(value).map_err(|source| StorageError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.entries.insert(key.to_string(), value);
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::metrics::{HISTORY_KEY, MetricsStore, TOTAL_KEY};

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("state.json")).unwrap();
        assert_eq!(store.load::<u64>(TOTAL_KEY).unwrap(), None);
    }

    #[test]
    fn metrics_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut metrics = MetricsStore::load(FileStore::open(&path).unwrap());
        metrics.record(87).unwrap();
        metrics.record(42).unwrap();
        let before = metrics.snapshot();

        let reopened = MetricsStore::load(FileStore::open(&path).unwrap());
        assert_eq!(reopened.snapshot(), before);
        assert_eq!(reopened.total_predictions(), 2);
    }

    #[test]
    fn file_uses_browser_key_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut store = FileStore::open(&path).unwrap();
        store.save(TOTAL_KEY, &3u64).unwrap();
        store.save(HISTORY_KEY, &vec![10u8, 90, 55]).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[TOTAL_KEY], 3);
        assert_eq!(raw[HISTORY_KEY], serde_json::json!([10, 90, 55]));
    }

    #[test]
    fn corrupt_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            FileStore::open(&path),
            Err(StorageError::Decode { .. })
        ));
    }
}
