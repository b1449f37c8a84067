//! Asynchronous key-value stores.
//!
//! The contract mirrors browser extension storage: `get` one key or every
//! key, `set` a batch of keys, `remove` one key. There are no transactions
//! and no ordering guarantee across keys; each call is atomic on its own.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{Result, SyncError};

/// Key-value mapping returned by [`KeyValueStore::get`].
pub type StorageMap = Map<String, Value>;

/// Storage collaborator behind the profile store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read one key, or every key when `key` is `None`.
    ///
    /// A missing key yields an empty map, not an error.
    async fn get(&self, key: Option<&str>) -> Result<StorageMap>;

    /// Write every key of `items`, replacing existing values.
    async fn set(&self, items: StorageMap) -> Result<()>;

    /// Remove a key. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<()>;
}

fn select(items: &StorageMap, key: Option<&str>) -> StorageMap {
    match key {
        None => items.clone(),
        Some(key) => items
            .get(key)
            .map(|v| {
                let mut single = Map::new();
                single.insert(key.to_string(), v.clone());
                single
            })
            .unwrap_or_default(),
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

/// Process-local store, used for sessions and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<StorageMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing contents.
    pub fn with_items(items: StorageMap) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> StorageMap {
        self.lock().map(|items| items.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StorageMap>> {
        self.items
            .lock()
            .map_err(|_| SyncError::storage("Memory store lock poisoned"))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: Option<&str>) -> Result<StorageMap> {
        Ok(select(&*self.lock()?, key))
    }

    async fn set(&self, items: StorageMap) -> Result<()> {
        self.lock()?.extend(items);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

// =============================================================================
// JsonFileStore
// =============================================================================

/// Store persisted as one pretty-printed JSON object on disk.
///
/// Every write rewrites the whole file through a staging file that is
/// renamed over the target. A missing file reads as an empty store; the
/// parent directory is created on first write.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<StorageMap> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(SyncError::storage(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            SyncError::storage(format!("Failed to parse {}: {}", self.path.display(), e))
        })
    }

    async fn write_all(&self, items: &StorageMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                SyncError::storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let content = serde_json::to_string_pretty(items)
            .map_err(|e| SyncError::storage(format!("Failed to serialize store: {}", e)))?;

        // The target is only ever replaced by rename, never written in place
        let staging = self.staging_path();
        tokio::fs::write(&staging, content).await.map_err(|e| {
            SyncError::storage(format!("Failed to write {}: {}", staging.display(), e))
        })?;

        if let Err(e) = tokio::fs::rename(&staging, &self.path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(SyncError::storage(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e
            )));
        }
        Ok(())
    }

    /// Sibling file a write is staged in, unique per process.
    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".{}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: Option<&str>) -> Result<StorageMap> {
        let items = self.read_all().await?;
        Ok(select(&items, key))
    }

    async fn set(&self, items: StorageMap) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut current = self.read_all().await?;
        current.extend(items);
        self.write_all(&current).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut current = self.read_all().await?;
        if current.remove(key).is_some() {
            self.write_all(&current).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn single(key: &str, value: Value) -> StorageMap {
        let mut map = Map::new();
        map.insert(key.into(), value);
        map
    }

    #[tokio::test]
    async fn test_memory_store_get_set_remove() {
        let store = MemoryStore::new();
        assert!(store.get(None).await.unwrap().is_empty());

        store.set(single("a", json!(1))).await.unwrap();
        store.set(single("b", json!({"x": true}))).await.unwrap();

        assert_eq!(store.get(Some("a")).await.unwrap(), single("a", json!(1)));
        assert!(store.get(Some("missing")).await.unwrap().is_empty());
        assert_eq!(store.get(None).await.unwrap().len(), 2);

        store.remove("a").await.unwrap();
        store.remove("a").await.unwrap();
        assert!(store.get(Some("a")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sync.json");

        let store = JsonFileStore::new(&path);
        assert!(store.get(None).await.unwrap().is_empty());
        store.set(single("prod", json!({"region": "us-east-1"}))).await.unwrap();
        store.set(single("defaultProfile", json!("prod"))).await.unwrap();

        let reopened = JsonFileStore::new(&path);
        let all = reopened.get(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["prod"], json!({"region": "us-east-1"}));

        reopened.remove("prod").await.unwrap();
        reopened.remove("prod").await.unwrap();
        assert_eq!(store.get(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.json");
        std::fs::write(&path, r#"{"old": 1}"#).unwrap();

        let store = JsonFileStore::new(&path);
        store.set(single("new", json!(2))).await.unwrap();
        store.remove("old").await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["sync.json"]);

        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, json!({"new": 2}));
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = JsonFileStore::new(&path);
        let err = store.get(None).await.unwrap_err();
        assert!(matches!(err, SyncError::Storage(_)));
    }
}
