//! Failure taxonomy for flag operations.
//!
//! Every variant is recovered locally and surfaced to the user as a single
//! message. None of them is fatal to the process.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagError {
    #[error("no active file")]
    NoActiveFile,

    #[error("file must be saved before it can hold flags")]
    UnsavedDocument,

    #[error("a flag already exists on line {}", .line + 1)]
    DuplicateFlag { line: usize },

    #[error("line {} is past the end of the file ({line_count} lines)", .line + 1)]
    LineOutOfRange { line: usize, line_count: usize },

    #[error("tone {tone} is already used in this file")]
    ToneInUse { tone: String },

    #[error("all tones are already used in this file")]
    ToneCatalogExhausted,

    #[error("no matching flag")]
    NotFound,

    /// The user dismissed a prompt. Informational, not a failure.
    #[error("selection cancelled")]
    SelectionCancelled,

    #[error("stored record for {file_id} is corrupt: {reason}")]
    CorruptPersistedRecord { file_id: String, reason: String },

    #[error("flag decorations are not initialized")]
    RenderingResourceUnavailable,

    #[error("storage error: {0}")]
    Storage(String),
}

impl FlagError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, FlagError::SelectionCancelled)
    }
}

impl From<anyhow::Error> for FlagError {
    fn from(err: anyhow::Error) -> Self {
        FlagError::Storage(format!("{:#}", err))
    }
}

pub type FlagResult<T> = std::result::Result<T, FlagError>;
