//! In-memory object store.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use super::{object_key, ObjectStore, StorageError};

/// Keeps uploaded file contents in a map keyed by object name
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Object keys currently stored, sorted
    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Contents of one object
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        // A panic while holding the lock cannot leave the map half-written.
        self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload(&self, path: &Path) -> Result<String, StorageError> {
        let key = object_key(path)?;
        let data = tokio::fs::read(path).await?;
        self.lock().insert(key.clone(), data);
        Ok(format!("memory://{}", key))
    }

    async fn clear_bucket(&self) -> Result<usize, StorageError> {
        let mut objects = self.lock();
        let count = objects.len();
        objects.clear();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topic_run.csv");
        std::fs::write(&path, b"ID,Title\n").unwrap();

        let store = MemoryStore::new();
        let uri = store.upload(&path).await.unwrap();

        assert_eq!(uri, "memory://topic_run.csv");
        assert_eq!(store.get("topic_run.csv").unwrap(), b"ID,Title\n");

        assert_eq!(store.clear_bucket().await.unwrap(), 1);
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let store = MemoryStore::new();
        let result = store.upload(Path::new("/nonexistent/dir/file.csv")).await;
        assert!(matches!(result, Err(StorageError::Io(_))));
    }
}
