//! Implementations of the `lflag` subcommands.
//!
//! Each run opens the SQLite store, builds a [`FlagService`] over a
//! [`FileEditor`] for the target file, replays the "file became active"
//! event so stored flags are hydrated, then executes one command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::task::JoinHandle;
use tracing::warn;

use lineflags_core::reconcile::EditEvent;
use lineflags_core::store::RecordStore;
use lineflags_core::tone::catalog;

use crate::commands::{run_command, Command, CommandReport};
use crate::config::Config;
use crate::flags::{FlagService, Hosts};
use crate::host::{EditorHost, FsExistence, LifecycleEvent, Silent};
use crate::persistence::Persistence;
use crate::sqlite_store::SqliteRecordStore;
use crate::terminal::{CliPrompt, FileEditor, PrintedAudio};

struct Session {
    store: Arc<SqliteRecordStore>,
    editor: Arc<FileEditor>,
    service: FlagService,
    gc: Vec<JoinHandle<()>>,
}

impl Session {
    async fn open(
        config: &Config,
        editor: FileEditor,
        prompt: CliPrompt,
        audible: bool,
    ) -> Result<Self> {
        let store = Arc::new(SqliteRecordStore::open(config).await?);
        let editor = Arc::new(editor);
        let hosts = Hosts {
            editor: editor.clone(),
            prompt: Arc::new(prompt),
            audio: if audible {
                Arc::new(PrintedAudio)
            } else {
                Arc::new(Silent)
            },
        };
        let service = FlagService::new(
            Persistence::new(store.clone()),
            hosts,
            config.reconcile.policy,
        );

        // Runs alongside the command; `close` waits for it before the pool
        // shuts down.
        let gc = if config.gc.on_startup {
            service.startup(Arc::new(FsExistence)).await?
        } else {
            Vec::new()
        };
        service
            .on_lifecycle(&LifecycleEvent::ActiveChanged {
                file_id: editor.file_id().to_string(),
                is_unsaved: false,
            })
            .await?;

        Ok(Self {
            store,
            editor,
            service,
            gc,
        })
    }

    async fn run(&self, command: Command) -> CommandReport {
        run_command(&self.service, command).await
    }

    async fn close(self) {
        for handle in self.gc {
            if let Err(e) = handle.await {
                warn!(error = %e, "garbage collection task failed");
            }
        }
        self.store.close().await;
    }
}

fn finish(report: CommandReport) -> Result<()> {
    if report.is_error() {
        bail!("{}", report.message);
    }
    println!("{}", report.message);
    Ok(())
}

fn editor_for(config: &Config, file: &Path, line: usize) -> Result<FileEditor> {
    FileEditor::open(file, line, config.search.viewport_lines)
}

/// Print the tone catalog.
pub fn run_tones() {
    println!("{:<10} {:<10} NOTE", "TONE", "PROGRAM");
    for t in catalog() {
        println!("{:<10} {:<10} {}", t.name, t.instrument, t.note);
    }
}

/// Print the stored flags of a file. Lines are 1-based.
pub async fn run_list(config: &Config, file: &Path) -> Result<()> {
    let editor = editor_for(config, file, 0)?;
    let session = Session::open(config, editor, CliPrompt::new(None), false).await?;

    match session.service.document(session.editor.file_id()) {
        Some(doc) => {
            println!("{:<6} {:<10} {:<8} TEXT", "LINE", "TONE", "NOTE");
            for flag in &doc.flags {
                let text = session
                    .editor
                    .line_text(flag.line_num)
                    .unwrap_or_default();
                println!(
                    "{:<6} {:<10} {:<8} {}",
                    flag.line_num + 1,
                    flag.tone.name,
                    flag.tone.note,
                    text.trim()
                );
            }
        }
        None => println!("No flags in {}", session.editor.file_id()),
    }
    session.close().await;
    Ok(())
}

pub async fn run_add(
    config: &Config,
    file: &Path,
    line: usize,
    tone: Option<String>,
) -> Result<()> {
    let editor = editor_for(config, file, line)?;
    let session = Session::open(config, editor, CliPrompt::new(tone), false).await?;
    let report = session.run(Command::AddFlag).await;
    session.close().await;
    finish(report)
}

pub async fn run_delete(config: &Config, file: &Path, line: usize) -> Result<()> {
    let editor = editor_for(config, file, line)?;
    let session = Session::open(config, editor, CliPrompt::new(None), false).await?;
    let report = session.run(Command::DeleteFlag).await;
    session.close().await;
    finish(report)
}

/// Navigate from `line`, optionally restricted to flags matching `query`.
pub async fn run_next(
    config: &Config,
    file: &Path,
    line: usize,
    query: Option<String>,
) -> Result<()> {
    let editor = editor_for(config, file, line)?;
    let session = Session::open(config, editor, CliPrompt::new(None), false).await?;

    let report = match query {
        Some(query) => {
            let searched = session.run(Command::SearchFlags { query }).await;
            if searched.is_error() {
                searched
            } else {
                session.editor.set_cursor(line, 0);
                session.run(Command::JumpToMatch).await
            }
        }
        None => session.run(Command::NavigateToFlag).await,
    };
    let (to_line, column) = session.editor.cursor();
    session.close().await;
    finish(report)?;
    println!("cursor: line {}, column {}", to_line + 1, column + 1);
    Ok(())
}

pub async fn run_search(config: &Config, file: &Path, query: &str, line: usize) -> Result<()> {
    let editor = editor_for(config, file, line)?;
    let session = Session::open(config, editor, CliPrompt::new(None), false).await?;
    let report = session
        .run(Command::SearchFlags {
            query: query.to_string(),
        })
        .await;

    let highlights = session.editor.highlights();
    let (to_line, column) = session.editor.cursor();
    session.close().await;
    finish(report)?;
    for m in highlights {
        println!("{}:{}-{}", m.line + 1, m.start + 1, m.end + 1);
    }
    println!("cursor: line {}, column {}", to_line + 1, column + 1);
    Ok(())
}

/// Reconcile stored flags with the file's current line count after an
/// edit made outside any editor, then persist them.
pub async fn run_sync(config: &Config, file: &Path, start: usize) -> Result<()> {
    let editor = editor_for(config, file, start)?;
    let session = Session::open(config, editor, CliPrompt::new(None), false).await?;
    let file_id = session.editor.file_id().to_string();

    let event = EditEvent::new(file_id.clone(), session.editor.line_count(), start);
    let outcome = session.service.on_edit(&event).await;
    let saved = session
        .service
        .on_lifecycle(&LifecycleEvent::Saved {
            file_id: file_id.clone(),
        })
        .await;
    session.close().await;

    saved?;
    match outcome? {
        Some(outcome) => {
            println!(
                "shifted {} flag(s) by {}, dropped {}",
                outcome.moved,
                outcome.delta,
                outcome.dropped.len()
            );
        }
        None => println!("No changes for {}", file_id),
    }
    Ok(())
}

pub async fn run_cue(
    config: &Config,
    file: &Path,
    line: usize,
    context: Option<String>,
) -> Result<()> {
    let editor = editor_for(config, file, line)?.with_context(context.unwrap_or_default());
    let session = Session::open(config, editor, CliPrompt::new(None), true).await?;
    let report = session.run(Command::PlayLineAudio).await;
    session.close().await;
    finish(report)
}

/// Run garbage collection to completion and report how many records went.
pub async fn run_gc(config: &Config) -> Result<()> {
    let store = Arc::new(SqliteRecordStore::open(config).await?);
    let persistence = Persistence::new(store.clone());

    let before = store.keys().await?.len();
    for handle in persistence.startup_garbage_collect(Arc::new(FsExistence)).await? {
        handle.await?;
    }
    let after = store.keys().await?.len();
    store.close().await;

    println!("removed {} record(s), {} remaining", before - after, after);
    Ok(())
}
