//! # lineflags core
//!
//! Shared, I/O-free logic for lineflags: the tone catalog, flag/document
//! models, the position reconciler, navigation, search matching, cue
//! resolution, and the record store abstraction.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies.

pub mod cue;
pub mod error;
pub mod models;
pub mod navigate;
pub mod reconcile;
pub mod search;
pub mod store;
pub mod tone;

pub use error::{FlagError, FlagResult};
pub use models::{Document, Flag};
pub use tone::Tone;
