//! Persistence layer: save, validated load, and startup garbage collection.
//!
//! Records are JSON documents stored under their file id:
//!
//! ```json
//! { "fileId": "/w/main.py", "lineCount": 40,
//!   "flags": [ { "lineNum": 3, "tone": { "name": "Piano1", "instrument": 0, "note": "D2" } } ] }
//! ```
//!
//! # Self-healing
//!
//! [`Persistence::load`] never surfaces a bad record. A record that fails to
//! parse, misses a field, has a wrong type, or names another file is deleted
//! and reported as absent. Storage failures on read are also reported as
//! absent (and logged) so nothing from this layer reaches the registry as an
//! error.
//!
//! # Garbage collection
//!
//! [`Persistence::startup_garbage_collect`] spawns one independent task per
//! stored key. There is no completion barrier: until a key's task has run, a
//! record for a file that no longer exists is still visible to `load`.

use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use lineflags_core::error::{FlagError, FlagResult};
use lineflags_core::models::{Document, Flag};
use lineflags_core::store::RecordStore;
use lineflags_core::tone::Tone;

use crate::host::FileExistence;

/// Highest valid General MIDI program number.
const MAX_INSTRUMENT: u8 = 127;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    file_id: String,
    line_count: usize,
    flags: Vec<StoredFlag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredFlag {
    line_num: usize,
    tone: StoredTone,
}

#[derive(Debug, Deserialize)]
struct StoredTone {
    name: String,
    instrument: u8,
    note: String,
}

/// Parse and validate a raw record for `key`.
fn decode(key: &str, raw: &str) -> std::result::Result<Document, String> {
    let record: StoredRecord = serde_json::from_str(raw).map_err(|e| e.to_string())?;

    if record.file_id != key {
        return Err(format!("record names {} instead", record.file_id));
    }
    if record.flags.is_empty() {
        return Err("record has no flags".to_string());
    }

    let mut flags = Vec::with_capacity(record.flags.len());
    for f in record.flags {
        if f.tone.instrument > MAX_INSTRUMENT {
            return Err(format!(
                "instrument {} out of range on line {}",
                f.tone.instrument, f.line_num
            ));
        }
        flags.push(Flag::new(
            f.line_num,
            Tone {
                name: f.tone.name,
                instrument: f.tone.instrument,
                note: f.tone.note,
            },
        ));
    }
    flags.sort_by_key(|f| f.line_num);

    Ok(Document {
        file_id: record.file_id,
        line_count: record.line_count,
        flags,
    })
}

/// Save/load/GC over a [`RecordStore`].
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn RecordStore>,
}

impl Persistence {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Write `doc`, or delete its record when it has no flags.
    pub async fn save(&self, doc: &Document) -> FlagResult<()> {
        if doc.is_empty() {
            debug!(file_id = %doc.file_id, "removing empty flag record");
            self.store.delete(&doc.file_id).await?;
            return Ok(());
        }
        let raw = serde_json::to_string(doc).map_err(|e| FlagError::Storage(e.to_string()))?;
        self.store.put(&doc.file_id, &raw).await?;
        debug!(file_id = %doc.file_id, flags = doc.flags.len(), "saved flag record");
        Ok(())
    }

    /// Read and validate the record for `file_id`.
    ///
    /// Returns `None` when there is no record, when the record was corrupt
    /// (it is deleted), or when the store could not be read.
    pub async fn load(&self, file_id: &str) -> Option<Document> {
        let raw = match self.store.get(file_id).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(file_id, error = %e, "could not read flag record");
                return None;
            }
        };

        match decode(file_id, &raw) {
            Ok(doc) => Some(doc),
            Err(reason) => {
                let err = FlagError::CorruptPersistedRecord {
                    file_id: file_id.to_string(),
                    reason,
                };
                warn!(file_id, "{}; deleting it", err);
                if let Err(e) = self.store.delete(file_id).await {
                    warn!(file_id, error = %e, "could not delete corrupt flag record");
                }
                None
            }
        }
    }

    /// Delete records whose file no longer exists, one background task per key.
    ///
    /// The returned handles may be dropped; the tasks keep running.
    pub async fn startup_garbage_collect(
        &self,
        files: Arc<dyn FileExistence>,
    ) -> Result<Vec<JoinHandle<()>>> {
        let keys = self.store.keys().await?;
        debug!(records = keys.len(), "starting flag record garbage collection");

        let handles = keys
            .into_iter()
            .map(|key| {
                let store = Arc::clone(&self.store);
                let files = Arc::clone(&files);
                tokio::spawn(async move {
                    if files.exists(&key).await {
                        return;
                    }
                    match store.delete(&key).await {
                        Ok(()) => info!(file_id = %key, "removed flags for missing file"),
                        Err(e) => warn!(file_id = %key, error = %e, "garbage collection failed"),
                    }
                })
            })
            .collect();
        Ok(handles)
    }
}
