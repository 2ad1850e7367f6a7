//! Host implementation for the `lflag` CLI.
//!
//! The "editor" is a file read from disk with a simulated cursor and a
//! viewport of `[search].viewport_lines` lines centred on it. Tones come
//! from `--tone` or, when stdin is a terminal, from a numbered prompt where
//! `?N` plays candidate N before choosing.

use std::ops::Range;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use lineflags_core::cue::Cue;
use lineflags_core::error::FlagResult;
use lineflags_core::models::Flag;
use lineflags_core::search::SearchMatch;
use lineflags_core::tone::Tone;

use crate::host::{ActiveFile, AudioSink, EditorHost, TonePrompt};

/// A file on disk presented as the active editor.
pub struct FileEditor {
    file_id: String,
    lines: Vec<String>,
    viewport: usize,
    context: String,
    cursor: Mutex<(usize, usize)>,
    highlights: Mutex<Vec<SearchMatch>>,
}

impl FileEditor {
    /// Open `path` with the cursor at the start of `cursor_line`.
    pub fn open(path: &Path, cursor_line: usize, viewport: usize) -> Result<Self> {
        let canonical = std::fs::canonicalize(path)
            .with_context(|| format!("Failed to resolve file: {}", path.display()))?;
        let text = std::fs::read_to_string(&canonical)
            .with_context(|| format!("Failed to read file: {}", canonical.display()))?;
        Ok(Self {
            file_id: canonical.to_string_lossy().to_string(),
            lines: text.lines().map(str::to_string).collect(),
            viewport,
            context: String::new(),
            cursor: Mutex::new((cursor_line, 0)),
            highlights: Mutex::new(Vec::new()),
        })
    }

    /// Description returned by the context classifier for every line.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn active(&self) -> ActiveFile {
        ActiveFile::saved(self.file_id.clone(), self.line_count())
    }

    /// Current `(line, column)`.
    pub fn cursor(&self) -> (usize, usize) {
        *self.cursor.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn highlights(&self) -> Vec<SearchMatch> {
        self.highlights
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl EditorHost for FileEditor {
    fn active_file(&self) -> Option<ActiveFile> {
        Some(self.active())
    }

    fn cursor_line(&self) -> usize {
        self.cursor().0
    }

    fn line_text(&self, line: usize) -> Option<String> {
        self.lines.get(line).cloned()
    }

    fn set_cursor(&self, line: usize, column: usize) {
        *self.cursor.lock().unwrap_or_else(|p| p.into_inner()) = (line, column);
    }

    fn visible_lines(&self) -> Range<usize> {
        let start = self.cursor_line().saturating_sub(self.viewport / 2);
        let end = (start + self.viewport).min(self.line_count());
        start..end.max(start)
    }

    fn refresh_decorations(&self, file_id: &str, flags: &[Flag]) -> FlagResult<()> {
        debug!(file_id, flags = flags.len(), "decorations refreshed");
        Ok(())
    }

    fn set_search_highlights(&self, matches: &[SearchMatch]) {
        *self.highlights.lock().unwrap_or_else(|p| p.into_inner()) = matches.to_vec();
    }

    fn clear_search_highlights(&self) {
        self.highlights
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
    }

    fn line_context(&self, _line: usize) -> String {
        self.context.clone()
    }
}

/// Tone prompt driven by `--tone`, falling back to stdin when interactive.
pub struct CliPrompt {
    requested: Option<String>,
}

impl CliPrompt {
    pub fn new(requested: Option<String>) -> Self {
        Self { requested }
    }
}

fn pick(options: &[Tone], answer: &str) -> Option<Tone> {
    let answer = answer.trim();
    if let Ok(n) = answer.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| options.get(i)).cloned();
    }
    options
        .iter()
        .find(|t| t.name.eq_ignore_ascii_case(answer))
        .cloned()
}

/// One line typed at the interactive prompt.
#[derive(Debug, PartialEq)]
enum Answer {
    Pick(Tone),
    Preview(Tone),
    /// Not one of the offered tones; ask again.
    Unknown,
    Cancel,
}

fn parse_answer(options: &[Tone], line: &str) -> Answer {
    let line = line.trim();
    if line.is_empty() {
        return Answer::Cancel;
    }
    if let Some(rest) = line.strip_prefix('?') {
        return pick(options, rest).map_or(Answer::Unknown, Answer::Preview);
    }
    pick(options, line).map_or(Answer::Unknown, Answer::Pick)
}

#[async_trait]
impl TonePrompt for CliPrompt {
    async fn choose(&self, options: Vec<Tone>, preview: &dyn AudioSink) -> Option<Tone> {
        if let Some(name) = &self.requested {
            let chosen = pick(&options, name);
            if chosen.is_none() {
                warn!(tone = %name, "tone is not available for this file");
            }
            return chosen;
        }
        if !atty::is(atty::Stream::Stdin) {
            return None;
        }

        eprintln!("Pick a tone, ?N to hear one first (empty to cancel):");
        for (i, t) in options.iter().enumerate() {
            eprintln!("  {:>2}. {:<9} {}", i + 1, t.name, t.note);
        }
        let mut stdin = BufReader::new(tokio::io::stdin());
        loop {
            let mut line = String::new();
            match stdin.read_line(&mut line).await {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            }
            match parse_answer(&options, &line) {
                Answer::Pick(tone) => return Some(tone),
                Answer::Preview(tone) => preview.play(&Cue::from(&tone)),
                Answer::Unknown => eprintln!("not one of the listed tones"),
                Answer::Cancel => return None,
            }
        }
    }
}

/// Audio sink that prints each cue to stderr.
pub struct PrintedAudio;

impl AudioSink for PrintedAudio {
    fn play(&self, cue: &Cue) {
        eprintln!("♪ {} (program {})", cue.note, cue.instrument);
    }
}
