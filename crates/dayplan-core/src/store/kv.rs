//! Synchronous key-value storage contract

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::{Error, Result};

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvWrite {
    Set { key: String, value: String },
    Remove { key: String },
}

impl KvWrite {
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Self::Remove { key: key.into() }
    }
}

/// String-to-string store with synchronous, non-suspending access.
///
/// Values are opaque JSON text; decoding lives in [`super::LocalStore`].
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// All keys currently present, in ascending order.
    fn keys(&self) -> Result<Vec<String>>;

    /// Apply every write or none of them. Readers never observe a partial batch.
    fn apply(&self, writes: &[KvWrite]) -> Result<()>;
}

/// In-memory store, used by tests and as a scratch store.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|error| Error::Storage(error.to_string()))
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries()?.keys().cloned().collect())
    }

    fn apply(&self, writes: &[KvWrite]) -> Result<()> {
        let mut entries = self.entries()?;
        for write in writes {
            match write {
                KvWrite::Set { key, value } => {
                    entries.insert(key.clone(), value.clone());
                }
                KvWrite::Remove { key } => {
                    entries.remove(key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn memory_store_applies_batches() {
        let store = MemoryKeyValueStore::new();
        store.set("a", "1").unwrap();
        store
            .apply(&[KvWrite::set("b", "2"), KvWrite::remove("a")])
            .unwrap();

        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
        assert_eq!(store.keys().unwrap(), vec!["b".to_string()]);
    }
}
