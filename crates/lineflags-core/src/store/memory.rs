//! In-memory [`RecordStore`] implementation for tests and embedding hosts.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Keys are returned sorted so
//! callers iterating over them see a deterministic order.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::RecordStore;

#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<String, String>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> anyhow::Error {
    anyhow!("record store lock poisoned")
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        records.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        records.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        let mut keys: Vec<String> = records.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = InMemoryRecordStore::new();
        assert!(store.get("/a").await.unwrap().is_none());

        store.put("/a", "{}").await.unwrap();
        assert_eq!(store.get("/a").await.unwrap().as_deref(), Some("{}"));

        store.put("/a", "[]").await.unwrap();
        assert_eq!(store.get("/a").await.unwrap().as_deref(), Some("[]"));

        store.delete("/a").await.unwrap();
        assert!(store.get("/a").await.unwrap().is_none());
        store.delete("/a").await.unwrap();
    }

    #[tokio::test]
    async fn test_keys_sorted() {
        let store = InMemoryRecordStore::new();
        store.put("/b", "1").await.unwrap();
        store.put("/a", "2").await.unwrap();
        assert_eq!(store.keys().await.unwrap(), vec!["/a", "/b"]);
        assert_eq!(store.len(), 2);
    }
}
