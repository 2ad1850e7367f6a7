//! Flag and document models.
//!
//! A [`Document`] is the tracked state of one file: its last known line
//! count and its flags. The mutating methods here enforce the ordering and
//! uniqueness invariants; callers never push into `flags` directly.
//!
//! Field names serialize in camelCase so a `Document` is exactly the
//! persisted record shape:
//!
//! ```json
//! { "fileId": "/src/main.py", "lineCount": 40,
//!   "flags": [ { "lineNum": 3, "tone": { "name": "Piano1", "instrument": 0, "note": "D2" } } ] }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{FlagError, FlagResult};
use crate::tone::{self, Tone};

/// A line-anchored annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flag {
    /// Zero-based line index.
    pub line_num: usize,
    pub tone: Tone,
}

impl Flag {
    pub fn new(line_num: usize, tone: Tone) -> Self {
        Self { line_num, tone }
    }
}

/// Tracked state of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Canonical file path; the document's identity.
    pub file_id: String,
    pub line_count: usize,
    /// Sorted ascending by `line_num`.
    pub flags: Vec<Flag>,
}

impl Document {
    pub fn new(file_id: impl Into<String>, line_count: usize) -> Self {
        Self {
            file_id: file_id.into(),
            line_count,
            flags: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn flag_at(&self, line: usize) -> Option<&Flag> {
        self.flags.iter().find(|f| f.line_num == line)
    }

    pub fn has_tone(&self, tone: &Tone) -> bool {
        self.flags.iter().any(|f| f.tone.name == tone.name)
    }

    pub fn used_tones(&self) -> impl Iterator<Item = &Tone> {
        self.flags.iter().map(|f| &f.tone)
    }

    /// Tones that can still be assigned in this document.
    pub fn available_tones(&self) -> Vec<Tone> {
        tone::available(self.used_tones())
    }

    /// Insert a flag, keeping `flags` sorted.
    ///
    /// Fails if the line already holds a flag or the tone is taken.
    pub fn insert_flag(&mut self, flag: Flag) -> FlagResult<()> {
        if self.flag_at(flag.line_num).is_some() {
            return Err(FlagError::DuplicateFlag {
                line: flag.line_num,
            });
        }
        if self.has_tone(&flag.tone) {
            return Err(FlagError::ToneInUse {
                tone: flag.tone.name,
            });
        }
        let pos = self.flags.partition_point(|f| f.line_num < flag.line_num);
        self.flags.insert(pos, flag);
        Ok(())
    }

    pub fn remove_flag_at(&mut self, line: usize) -> FlagResult<Flag> {
        let pos = self
            .flags
            .iter()
            .position(|f| f.line_num == line)
            .ok_or(FlagError::NotFound)?;
        Ok(self.flags.remove(pos))
    }

    /// Flags whose line is one of `lines`, in document order.
    pub fn flags_on_lines(&self, lines: &[usize]) -> Vec<Flag> {
        self.flags
            .iter()
            .filter(|f| lines.contains(&f.line_num))
            .cloned()
            .collect()
    }

    /// True when `flags` is sorted with unique lines and unique tones.
    pub fn invariants_hold(&self) -> bool {
        let sorted_unique = self.flags.windows(2).all(|w| w[0].line_num < w[1].line_num);
        let mut names: Vec<&str> = self.flags.iter().map(|f| f.tone.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        sorted_unique && names.len() == self.flags.len()
    }
}
