//! Keyed map held in memory with optional write-through to a [`JsonFile`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StorageError;
use crate::json_file::JsonFile;

/// A string-keyed map whose mutations are persisted before they return.
///
/// The lock is held across the file write, so the file always reflects the
/// order in which mutations were applied.
pub struct PersistentMap<V> {
    entries: Mutex<BTreeMap<String, V>>,
    file: Option<JsonFile>,
}

impl<V> PersistentMap<V>
where
    V: Serialize + DeserializeOwned + Clone + Send,
{
    pub fn in_memory() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            file: None,
        }
    }

    /// Open a map backed by `path`, loading whatever is already there.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let file = JsonFile::new(path);
        let entries: BTreeMap<String, V> = file.load().await?;
        debug!(path = %file.path().display(), entries = entries.len(), "Loaded persistent map");
        Ok(Self {
            entries: Mutex::new(entries),
            file: Some(file),
        })
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.entries.lock().await.get(key).cloned()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.lock().await.contains_key(key)
    }

    pub async fn values(&self) -> Vec<V> {
        self.entries.lock().await.values().cloned().collect()
    }

    pub async fn insert(&self, key: &str, value: V) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value);
        self.persist(&entries).await
    }

    /// Apply `f` to the entry for `key`, creating it with `init` first if absent.
    pub async fn upsert<I, F>(&self, key: &str, init: I, f: F) -> Result<V, StorageError>
    where
        I: FnOnce() -> V,
        F: FnOnce(&mut V),
    {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(key.to_string()).or_insert_with(init);
        f(entry);
        let updated = entry.clone();
        self.persist(&entries).await?;
        Ok(updated)
    }

    /// Remove `key`. Returns whether it was present.
    pub async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_none() {
            return Ok(false);
        }
        self.persist(&entries).await?;
        Ok(true)
    }

    async fn persist(&self, entries: &BTreeMap<String, V>) -> Result<(), StorageError> {
        match &self.file {
            Some(file) => file.save(entries).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let map: PersistentMap<u32> = PersistentMap::in_memory();
        let v = map.upsert("k", || 1, |v| *v += 10).await.unwrap();
        assert_eq!(v, 11);
        let v = map.upsert("k", || 1, |v| *v += 10).await.unwrap();
        assert_eq!(v, 21);
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let map: PersistentMap<u32> = PersistentMap::in_memory();
        assert!(!map.remove("missing").await.unwrap());
        map.insert("k", 3).await.unwrap();
        assert!(map.remove("k").await.unwrap());
        assert!(!map.contains("k").await);
    }

    #[tokio::test]
    async fn test_reopen_sees_previous_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");
        {
            let map: PersistentMap<String> = PersistentMap::open(&path).await.unwrap();
            map.insert("a", "x".to_string()).await.unwrap();
            map.insert("b", "y".to_string()).await.unwrap();
            map.remove("a").await.unwrap();
        }
        let map: PersistentMap<String> = PersistentMap::open(&path).await.unwrap();
        assert_eq!(map.get("a").await, None);
        assert_eq!(map.get("b").await.as_deref(), Some("y"));
    }
}
