//! SQLite connection management for the flag record store.
//!
//! WAL mode is enabled so the CLI and a long-running host can share the
//! same database file; a busy timeout covers the short write windows where
//! both touch it. The file and its parent directories are created on first
//! connect.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::config::Config;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a pool on the configured flag database.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let path = &config.store.path;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create store directory: {}", dir.display()))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open flag store: {}", path.display()))
}
