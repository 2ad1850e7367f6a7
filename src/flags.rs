//! Flag operations against the active file.
//!
//! [`FlagService`] owns the [`DocumentRegistry`] and orchestrates every
//! mutation of it: add, delete, reconcile on edit, hydrate on activation,
//! evict on close. Reads (navigation, search, cues) work from snapshots.
//!
//! # Concurrency
//!
//! The service is shared behind an `Arc` and its operations interleave at
//! await points: the tone prompt, storage I/O, and existence checks. Two
//! rules keep documents consistent:
//!
//! 1. Every mutate-then-persist step runs under the file's [`FileLocks`]
//!    guard, so a storage write always reflects the mutation that
//!    preceded it.
//! 2. The tone prompt runs *outside* the guard. Add re-validates the
//!    duplicate-line and duplicate-tone checks after the prompt returns,
//!    because another add, a delete, or an edit may have run meanwhile.
//!
//! The registry mutex is never held across an await.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use lineflags_core::cue::{resolve_cue, Cue};
use lineflags_core::error::{FlagError, FlagResult};
use lineflags_core::models::{Document, Flag};
use lineflags_core::navigate::next_target;
use lineflags_core::reconcile::{reconcile, EditEvent, ReconcileOutcome, ShiftPolicy};
use lineflags_core::search::{any_visible, find_matches, matched_lines, nearest_match, SearchMatch};
use lineflags_core::tone;

use crate::host::{
    ActiveFile, AudioSink, EditorHost, FileExistence, LifecycleEvent, SoundCues, TonePrompt,
};
use crate::persistence::Persistence;
use crate::registry::{DocumentRegistry, FileLocks};

/// The host collaborators a [`FlagService`] talks to.
#[derive(Clone)]
pub struct Hosts {
    pub editor: Arc<dyn EditorHost>,
    pub prompt: Arc<dyn TonePrompt>,
    pub audio: Arc<dyn AudioSink>,
}

/// Result of a search request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    pub matches: Vec<SearchMatch>,
    /// Line the cursor was moved to, if auto-navigation happened.
    pub moved_to: Option<usize>,
}

pub struct FlagService {
    registry: Mutex<DocumentRegistry>,
    locks: FileLocks,
    persistence: Persistence,
    hosts: Hosts,
    /// Every cue goes through here so it can be muted.
    audio: SoundCues,
    policy: ShiftPolicy,
    /// Last non-empty search query per file.
    queries: Mutex<HashMap<String, String>>,
}

fn stable_id(file: &ActiveFile) -> FlagResult<&str> {
    file.file_id.as_deref().ok_or(FlagError::UnsavedDocument)
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl FlagService {
    pub fn new(persistence: Persistence, hosts: Hosts, policy: ShiftPolicy) -> Self {
        Self {
            registry: Mutex::new(DocumentRegistry::new()),
            locks: FileLocks::new(),
            persistence,
            audio: SoundCues::new(hosts.audio.clone()),
            hosts,
            policy,
            queries: Mutex::new(HashMap::new()),
        }
    }

    pub fn editor(&self) -> &Arc<dyn EditorHost> {
        &self.hosts.editor
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    /// Snapshot of the registered document for `file_id`.
    pub fn document(&self, file_id: &str) -> Option<Document> {
        lock(&self.registry).get(file_id).cloned()
    }

    /// Kick off garbage collection of records for deleted files.
    pub async fn startup(&self, files: Arc<dyn FileExistence>) -> FlagResult<Vec<JoinHandle<()>>> {
        Ok(self.persistence.startup_garbage_collect(files).await?)
    }

    /// Load `file_id` from storage into the registry if it isn't there.
    /// Caller must hold the file's lock.
    async fn hydrate(&self, file_id: &str) {
        if lock(&self.registry).contains(file_id) {
            return;
        }
        if let Some(doc) = self.persistence.load(file_id).await {
            debug!(file_id, flags = doc.flags.len(), "hydrated flags from storage");
            lock(&self.registry).insert(doc);
        }
    }

    /// Redraw markers after a committed change. The change stands even if
    /// the redraw fails.
    fn refresh(&self, doc: &Document) {
        if let Err(e) = self
            .hosts
            .editor
            .refresh_decorations(&doc.file_id, &doc.flags)
        {
            warn!(file_id = %doc.file_id, error = %e, "decoration refresh failed");
        }
    }

    fn ensure_decorations(&self) -> FlagResult<()> {
        if self.hosts.editor.decorations_ready() {
            Ok(())
        } else {
            Err(FlagError::RenderingResourceUnavailable)
        }
    }

    pub fn sound_cues_enabled(&self) -> bool {
        self.audio.enabled()
    }

    /// Switch audio cues on or off. Returns the new state.
    pub fn toggle_sound_cues(&self) -> bool {
        let enabled = self.audio.toggle();
        info!(enabled, "sound cues toggled");
        enabled
    }

    /// Add a flag on `cursor_line`, asking the user for its tone.
    pub async fn add_flag(&self, file: &ActiveFile, cursor_line: usize) -> FlagResult<Flag> {
        let file_id = stable_id(file)?;
        if cursor_line >= file.line_count {
            return Err(FlagError::LineOutOfRange {
                line: cursor_line,
                line_count: file.line_count,
            });
        }
        self.ensure_decorations()?;

        let offered = {
            let _guard = self.locks.acquire(file_id).await;
            self.hydrate(file_id).await;
            let registry = lock(&self.registry);
            match registry.get(file_id) {
                Some(doc) if doc.flag_at(cursor_line).is_some() => {
                    return Err(FlagError::DuplicateFlag { line: cursor_line });
                }
                Some(doc) => doc.available_tones(),
                None => tone::catalog().to_vec(),
            }
        };
        if offered.is_empty() {
            return Err(FlagError::ToneCatalogExhausted);
        }

        let Some(chosen) = self.hosts.prompt.choose(offered, &self.audio).await else {
            info!(file_id, line = cursor_line, "tone selection cancelled");
            return Err(FlagError::SelectionCancelled);
        };

        let _guard = self.locks.acquire(file_id).await;
        self.ensure_decorations()?;
        self.hydrate(file_id).await;
        let snapshot = {
            let mut registry = lock(&self.registry);
            let doc = registry.get_or_create(file_id, file.line_count);
            if let Err(e) = doc.insert_flag(Flag::new(cursor_line, chosen.clone())) {
                // The document changed while the prompt was open.
                warn!(file_id, line = cursor_line, error = %e, "flag rejected after prompt");
                registry.evict_if_empty(file_id);
                return Err(e);
            }
            doc.clone()
        };

        self.persistence.save(&snapshot).await?;
        info!(file_id, line = cursor_line, tone = %chosen.name, "flag added");
        self.refresh(&snapshot);
        self.audio.play(&Cue::from(&chosen));
        Ok(Flag::new(cursor_line, chosen))
    }

    /// Remove the flag on `cursor_line`.
    pub async fn delete_flag(&self, file: &ActiveFile, cursor_line: usize) -> FlagResult<Flag> {
        let file_id = stable_id(file)?;
        self.ensure_decorations()?;
        let _guard = self.locks.acquire(file_id).await;
        self.hydrate(file_id).await;

        let (removed, snapshot) = {
            let mut registry = lock(&self.registry);
            let doc = registry.get_mut(file_id).ok_or(FlagError::NotFound)?;
            let removed = doc.remove_flag_at(cursor_line)?;
            let snapshot = doc.clone();
            registry.evict_if_empty(file_id);
            (removed, snapshot)
        };

        self.persistence.save(&snapshot).await?;
        info!(file_id, line = cursor_line, tone = %removed.tone.name, "flag deleted");
        self.refresh(&snapshot);
        Ok(removed)
    }

    /// Jump from `cursor_line` to the next flag among `candidates` and put
    /// the cursor at the end of that line.
    pub fn navigate_to_flag(&self, candidates: &[Flag], cursor_line: usize) -> FlagResult<Flag> {
        let target = next_target(candidates, cursor_line)?.clone();
        let column = self
            .hosts
            .editor
            .line_text(target.line_num)
            .map(|t| t.chars().count())
            .unwrap_or(0);
        self.hosts.editor.set_cursor(target.line_num, column);
        debug!(line = target.line_num, column, "navigated to flag");
        Ok(target)
    }

    /// Navigate among all flags of the file.
    pub fn navigate_all(&self, file: &ActiveFile, cursor_line: usize) -> FlagResult<Flag> {
        let file_id = stable_id(file)?;
        let flags = self
            .document(file_id)
            .map(|d| d.flags)
            .unwrap_or_default();
        self.navigate_to_flag(&flags, cursor_line)
    }

    fn flagged_line_matches(&self, doc: &Document, query: &str) -> Vec<SearchMatch> {
        let texts: Vec<(usize, String)> = doc
            .flags
            .iter()
            .filter_map(|f| {
                self.hosts
                    .editor
                    .line_text(f.line_num)
                    .map(|t| (f.line_num, t))
            })
            .collect();
        find_matches(texts.iter().map(|(l, t)| (*l, t.as_str())), query)
    }

    /// Search the text of flagged lines for `query`.
    ///
    /// Highlights every match. If none is on screen, moves the cursor to the
    /// match nearest `cursor_line`. An empty query clears the highlights.
    pub fn search_flags(
        &self,
        file: &ActiveFile,
        query: &str,
        cursor_line: usize,
    ) -> FlagResult<SearchOutcome> {
        let file_id = stable_id(file)?;
        let editor = &self.hosts.editor;

        if query.is_empty() {
            lock(&self.queries).remove(file_id);
            editor.clear_search_highlights();
            return Ok(SearchOutcome::default());
        }
        lock(&self.queries).insert(file_id.to_string(), query.to_string());

        let doc = self.document(file_id).ok_or(FlagError::NotFound)?;
        let matches = self.flagged_line_matches(&doc, query);
        if matches.is_empty() {
            editor.clear_search_highlights();
            return Ok(SearchOutcome::default());
        }
        editor.set_search_highlights(&matches);

        let mut moved_to = None;
        if !any_visible(&matches, &editor.visible_lines()) {
            if let Some(m) = nearest_match(&matches, cursor_line) {
                editor.set_cursor(m.line, m.start);
                moved_to = Some(m.line);
            }
        }
        debug!(file_id, query, matches = matches.len(), ?moved_to, "searched flags");
        Ok(SearchOutcome { matches, moved_to })
    }

    /// Navigate among flags matching the file's current query, or among all
    /// flags when there is no query or nothing matches.
    pub fn jump_to_match(&self, file: &ActiveFile, cursor_line: usize) -> FlagResult<Flag> {
        let file_id = stable_id(file)?;
        let doc = self.document(file_id).ok_or(FlagError::NotFound)?;
        let query = lock(&self.queries).get(file_id).cloned();

        let candidates = match query {
            Some(q) => {
                let lines = matched_lines(&self.flagged_line_matches(&doc, &q));
                if lines.is_empty() {
                    doc.flags.clone()
                } else {
                    doc.flags_on_lines(&lines)
                }
            }
            None => doc.flags.clone(),
        };
        self.navigate_to_flag(&candidates, cursor_line)
    }

    /// Play the cue for `line`: its flag's tone, or a context fallback.
    pub fn play_line_audio(&self, file: Option<&ActiveFile>, line: usize) -> Cue {
        let doc = file
            .and_then(|f| f.file_id.as_deref())
            .and_then(|id| self.document(id));
        let context = self.hosts.editor.line_context(line);
        let cue = resolve_cue(doc.as_ref(), line, &context);
        self.audio.play(&cue);
        cue
    }

    /// Apply an edit notification to a registered document.
    ///
    /// Unregistered files are ignored. The result is kept in memory until
    /// the next save event. Flags are re-anchored even when markers cannot
    /// be drawn, since skipping an edit would detach them from their text.
    pub async fn on_edit(&self, event: &EditEvent) -> FlagResult<Option<ReconcileOutcome>> {
        let _guard = self.locks.acquire(&event.file_id).await;
        let (outcome, snapshot) = {
            let mut registry = lock(&self.registry);
            let Some(doc) = registry.get_mut(&event.file_id) else {
                return Ok(None);
            };
            let Some(outcome) = reconcile(doc, event, self.policy) else {
                return Ok(None);
            };
            (outcome, doc.clone())
        };

        for dropped in &outcome.dropped {
            warn!(
                file_id = %event.file_id,
                line = dropped.line_num,
                tone = %dropped.tone.name,
                "flag dropped after colliding with another flag"
            );
        }
        debug!(
            file_id = %event.file_id,
            delta = outcome.delta,
            moved = outcome.moved,
            "reconciled flags"
        );
        self.refresh(&snapshot);
        Ok(Some(outcome))
    }

    pub async fn on_lifecycle(&self, event: &LifecycleEvent) -> FlagResult<()> {
        match event {
            LifecycleEvent::ActiveChanged {
                file_id,
                is_unsaved,
            } => {
                if *is_unsaved {
                    return Ok(());
                }
                let _guard = self.locks.acquire(file_id).await;
                self.hydrate(file_id).await;
                let snapshot = self.document(file_id);
                if let Some(doc) = snapshot {
                    self.refresh(&doc);
                }
            }
            LifecycleEvent::Saved { file_id } => {
                let _guard = self.locks.acquire(file_id).await;
                if let Some(doc) = self.document(file_id) {
                    self.persistence.save(&doc).await?;
                }
            }
            LifecycleEvent::Closed { file_id } => {
                lock(&self.registry).remove(file_id);
                lock(&self.queries).remove(file_id);
                debug!(file_id = %file_id, "evicted closed file");
            }
        }
        Ok(())
    }
}
