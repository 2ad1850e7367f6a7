//! Host collaborator traits.
//!
//! lineflags owns flag state; everything the user sees or hears belongs to
//! the host (an editor extension, the `lflag` CLI, a test harness). These
//! traits are the full boundary between the two.
//!
//! ```text
//! ┌──────────────┐  EditorHost / TonePrompt / AudioSink  ┌─────────────┐
//! │ FlagService  │──────────────────────────────────────▶│    Host     │
//! │ (registry,   │◀──────────────────────────────────────│ (editor UI) │
//! │  persistence)│   lifecycle + edit events, commands   └─────────────┘
//! └──────┬───────┘
//!        │ FileExistence (GC only)
//!        ▼
//!    filesystem
//! ```

use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use lineflags_core::cue::Cue;
use lineflags_core::error::FlagResult;
use lineflags_core::models::Flag;
use lineflags_core::search::SearchMatch;
use lineflags_core::tone::Tone;

/// The focused file as the host sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveFile {
    /// Canonical path, or `None` for an untitled/unsaved buffer.
    pub file_id: Option<String>,
    pub line_count: usize,
}

impl ActiveFile {
    pub fn saved(file_id: impl Into<String>, line_count: usize) -> Self {
        Self {
            file_id: Some(file_id.into()),
            line_count,
        }
    }

    pub fn unsaved(line_count: usize) -> Self {
        Self {
            file_id: None,
            line_count,
        }
    }
}

/// Editor lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    ActiveChanged { file_id: String, is_unsaved: bool },
    Saved { file_id: String },
    Closed { file_id: String },
}

/// The editor: cursor, text, viewport, and visual feedback.
pub trait EditorHost: Send + Sync {
    fn active_file(&self) -> Option<ActiveFile>;

    fn cursor_line(&self) -> usize;

    /// Text of `line` in the active file, without the line terminator.
    fn line_text(&self, line: usize) -> Option<String>;

    fn set_cursor(&self, line: usize, column: usize);

    /// Lines currently on screen, end-exclusive.
    fn visible_lines(&self) -> Range<usize>;

    /// Whether flag markers can be drawn right now. Mutations are refused
    /// while this is false.
    fn decorations_ready(&self) -> bool {
        true
    }

    /// Redraw the flag markers for `file_id`.
    fn refresh_decorations(&self, file_id: &str, flags: &[Flag]) -> FlagResult<()>;

    fn set_search_highlights(&self, matches: &[SearchMatch]);

    fn clear_search_highlights(&self);

    /// Open the host's highlight style configuration, if it has one.
    fn configure_search_highlight(&self) -> FlagResult<()> {
        Ok(())
    }

    /// Context classifier output for `line`, used to pick a fallback cue.
    fn line_context(&self, _line: usize) -> String {
        String::new()
    }
}

/// Interactive "pick one tone" prompt.
#[async_trait]
pub trait TonePrompt: Send + Sync {
    /// Offer `options` and wait for a choice. `None` means the user
    /// dismissed the prompt. `preview` plays a candidate on request.
    async fn choose(&self, options: Vec<Tone>, preview: &dyn AudioSink) -> Option<Tone>;
}

/// Sound output.
pub trait AudioSink: Send + Sync {
    fn play(&self, cue: &Cue);
}

/// Sink that discards every cue.
pub struct Silent;

impl AudioSink for Silent {
    fn play(&self, _cue: &Cue) {}
}

/// An [`AudioSink`] that can be switched off.
pub struct SoundCues {
    sink: Arc<dyn AudioSink>,
    enabled: AtomicBool,
}

impl SoundCues {
    pub fn new(sink: Arc<dyn AudioSink>) -> Self {
        Self {
            sink,
            enabled: AtomicBool::new(true),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Flip the switch and return the new state.
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::Relaxed)
    }
}

impl AudioSink for SoundCues {
    fn play(&self, cue: &Cue) {
        if self.enabled() {
            self.sink.play(cue);
        }
    }
}

/// Existence check used by garbage collection.
#[async_trait]
pub trait FileExistence: Send + Sync {
    async fn exists(&self, path: &str) -> bool;
}

/// [`FileExistence`] over the local filesystem.
pub struct FsExistence;

#[async_trait]
impl FileExistence for FsExistence {
    async fn exists(&self, path: &str) -> bool {
        tokio::fs::try_exists(Path::new(path)).await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Heard(Mutex<Vec<Cue>>);

    impl AudioSink for Heard {
        fn play(&self, cue: &Cue) {
            self.0.lock().unwrap().push(cue.clone());
        }
    }

    #[test]
    fn test_sound_cues_toggle() {
        let heard = Arc::new(Heard::default());
        let cues = SoundCues::new(heard.clone());
        let cue = Cue {
            instrument: 0,
            note: "D2".into(),
        };

        cues.play(&cue);
        assert!(!cues.toggle());
        cues.play(&cue);
        assert!(cues.toggle());
        cues.play(&cue);
        assert_eq!(heard.0.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fs_existence() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("a.txt");
        std::fs::write(&file, "x\n").unwrap();
        let files = FsExistence;
        assert!(files.exists(file.to_str().unwrap()).await);
        assert!(!files.exists(tmp.path().join("b.txt").to_str().unwrap()).await);
    }
}
