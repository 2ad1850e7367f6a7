//! TOML configuration parsing and validation.
//!
//! ```toml
//! [store]
//! path = "./data/lineflags.sqlite"
//!
//! [reconcile]
//! policy = "repair"   # or "legacy"
//!
//! [search]
//! viewport_lines = 40
//!
//! [gc]
//! on_startup = true
//!
//! [log]
//! filter = "warn"
//! ```
//!
//! Only `[store]` is required; every other section has defaults.

use anyhow::{Context, Result};
use lineflags_core::reconcile::ShiftPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub gc: GcConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ReconcileConfig {
    #[serde(default)]
    pub policy: ShiftPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Height of the viewport the CLI host reports around the cursor.
    #[serde(default = "default_viewport_lines")]
    pub viewport_lines: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            viewport_lines: default_viewport_lines(),
        }
    }
}

fn default_viewport_lines() -> usize {
    40
}

#[derive(Debug, Deserialize, Clone)]
pub struct GcConfig {
    #[serde(default = "default_true")]
    pub on_startup: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self { on_startup: true }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "warn".to_string()
}

impl Config {
    /// In-code defaults with the store under `./data`.
    pub fn minimal() -> Self {
        Self {
            store: StoreConfig {
                path: PathBuf::from("./data/lineflags.sqlite"),
            },
            reconcile: ReconcileConfig::default(),
            search: SearchConfig::default(),
            gc: GcConfig::default(),
            log: LogConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.store.path.as_os_str().is_empty() {
        anyhow::bail!("store.path must not be empty");
    }

    if config.search.viewport_lines == 0 {
        anyhow::bail!("search.viewport_lines must be > 0");
    }

    Ok(config)
}
