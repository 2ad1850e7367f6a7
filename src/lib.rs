//! # Line Flags
//!
//! Durable, line-anchored audio flags for text files.
//!
//! A flag marks one line of a file with a distinct [`Tone`]. Flags follow
//! their lines as the file is edited, survive restarts through a
//! [`RecordStore`](lineflags_core::store::RecordStore), and can be searched
//! and navigated. The pure model lives in `lineflags-core`; this crate adds
//! storage backends, the operation service, and the `lflag` CLI host.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │  EditorHost  │──▶│ FlagService  │──▶│  Persistence  │
//! │ prompt/audio │   │  registry +  │   │ RecordStore   │
//! └──────────────┘   │  file locks  │   │ memory/SQLite │
//!                    └──────────────┘   └───────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`host`] | Traits the embedding editor implements |
//! | [`flags`] | Flag operations and event handling |
//! | [`commands`] | Host commands and user-visible reports |
//! | [`persistence`] | Record encoding, validation, and garbage collection |
//! | [`registry`] | In-memory documents and per-file locks |
//! | [`sqlite_store`] | SQLite record store |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`terminal`] | File-backed host used by the CLI |
//! | [`cli`] | `lflag` subcommands |

pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod flags;
pub mod host;
pub mod migrate;
pub mod persistence;
pub mod registry;
pub mod sqlite_store;
pub mod terminal;

pub use lineflags_core::{Document, Flag, FlagError, FlagResult, Tone};
