use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to encode value for `{key}`: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode value for `{key}`: {detail}")]
    Decode { key: String, detail: String },
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Durable key-value association. Values are JSON encoded, which keeps the
/// browser's localStorage layout and the console's state file interchangeable.
pub trait KeyValueStore {
    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError>;
    fn save<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StorageError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert_raw(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }
}

impl KeyValueStore for MemoryStore {
    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(|e| StorageError::Decode {
                    key: key.to_string(),
                    detail: e.to_string(),
                }),
        }
    }

    fn save<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|source| StorageError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.entries.insert(key.to_string(), raw);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.load::<u64>("absent").unwrap(), None);
    }

    #[test]
    fn corrupt_value_is_a_decode_error() {
        let mut store = MemoryStore::new();
        store.insert_raw("totalPredictions", "not-a-number");
        assert!(matches!(
            store.load::<u64>("totalPredictions"),
            Err(StorageError::Decode { .. })
        ));
    }

    #[test]
    fn values_are_stored_as_json_text() {
        let mut store = MemoryStore::new();
        store.save("confidenceHistory", &vec![87u8, 91]).unwrap();
        assert_eq!(store.raw("confidenceHistory"), Some("[87,91]"));
    }
}
