//! In-memory registry of live documents.
//!
//! The registry only holds files that currently have flags (or are about to
//! get their first one). It is owned by a single [`FlagService`] and never
//! shared as a global.
//!
//! [`FileLocks`] provides the per-file operation serialization the service
//! uses around every mutate-then-persist step.
//!
//! [`FlagService`]: crate::flags::FlagService

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lineflags_core::models::Document;

#[derive(Debug, Default)]
pub struct DocumentRegistry {
    docs: HashMap<String, Document>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, file_id: &str) -> Option<&Document> {
        self.docs.get(file_id)
    }

    pub fn get_mut(&mut self, file_id: &str) -> Option<&mut Document> {
        self.docs.get_mut(file_id)
    }

    /// The entry for `file_id`, created empty if absent. Not persisted.
    pub fn get_or_create(&mut self, file_id: &str, line_count: usize) -> &mut Document {
        self.docs
            .entry(file_id.to_string())
            .or_insert_with(|| Document::new(file_id, line_count))
    }

    pub fn insert(&mut self, doc: Document) {
        self.docs.insert(doc.file_id.clone(), doc);
    }

    pub fn remove(&mut self, file_id: &str) -> Option<Document> {
        self.docs.remove(file_id)
    }

    pub fn contains(&self, file_id: &str) -> bool {
        self.docs.contains_key(file_id)
    }

    /// Drop the entry if it has no flags left. Returns true if evicted.
    pub fn evict_if_empty(&mut self, file_id: &str) -> bool {
        if self.docs.get(file_id).is_some_and(Document::is_empty) {
            self.docs.remove(file_id);
            return true;
        }
        false
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// Per-file async operation locks.
///
/// Holding the guard for a file serializes mutations of that file's
/// document, including the storage write that follows them. A file's entry
/// lives only while someone holds or waits for its lock.
#[derive(Default)]
pub struct FileLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, file_id: &str) -> FileGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(locks.entry(file_id.to_string()).or_default())
        };
        FileGuard {
            guard: Some(lock.lock_owned().await),
            locks: self,
            file_id: file_id.to_string(),
        }
    }

    /// Number of files with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held lock on one file. Dropping it forgets the file's entry when no
/// other operation is waiting on it.
pub struct FileGuard<'a> {
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
    locks: &'a FileLocks,
    file_id: String,
}

impl Drop for FileGuard<'_> {
    fn drop(&mut self) {
        // Unlock first so the map holds the only reference when idle.
        self.guard.take();
        let mut locks = self.locks.locks.lock().unwrap_or_else(|p| p.into_inner());
        if locks
            .get(&self.file_id)
            .is_some_and(|l| Arc::strong_count(l) == 1)
        {
            locks.remove(&self.file_id);
        }
    }
}
