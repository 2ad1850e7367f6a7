//! Key/value storage abstraction for persisted flag records.
//!
//! The [`RecordStore`] trait is deliberately dumb: it stores opaque JSON
//! strings under a file-id key. Parsing, validation, and self-healing live
//! one layer up, so every backend gets the same corruption handling.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

/// Abstract backing store for flag records.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get`](RecordStore::get) | Read the raw record for a key |
/// | [`put`](RecordStore::put) | Insert or replace a record |
/// | [`delete`](RecordStore::delete) | Remove a record (no-op if absent) |
/// | [`keys`](RecordStore::keys) | List every stored key |
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: &str) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn keys(&self) -> Result<Vec<String>>;
}
