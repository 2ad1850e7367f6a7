//! Host-facing commands.
//!
//! Each command resolves the active file and cursor from the
//! [`EditorHost`](crate::host::EditorHost), runs one flag operation, and
//! turns the outcome into a [`CommandReport`]. Nothing here returns an
//! error to the host: failures become messages.

use serde::Serialize;
use tracing::{error, info};

use lineflags_core::error::{FlagError, FlagResult};

use crate::flags::FlagService;
use crate::host::ActiveFile;

/// Commands exposed to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AddFlag,
    DeleteFlag,
    /// Jump to the next flag in the active file.
    NavigateToFlag,
    SearchFlags { query: String },
    /// Jump to the next flag matching the active search.
    JumpToMatch,
    PlayLineAudio,
    /// Mute or unmute every sound the service makes.
    ToggleSoundCues,
    ConfigureSearchHighlight,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::AddFlag => "AddFlag",
            Command::DeleteFlag => "DeleteFlag",
            Command::NavigateToFlag => "NavigateToFlag",
            Command::SearchFlags { .. } => "SearchFlags",
            Command::JumpToMatch => "JumpToMatch",
            Command::PlayLineAudio => "PlayLineAudio",
            Command::ToggleSoundCues => "ToggleSoundCues",
            Command::ConfigureSearchHighlight => "ConfigureSearchHighlight",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLevel {
    Info,
    Error,
}

/// A single user-visible message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandReport {
    pub level: ReportLevel,
    pub message: String,
}

impl CommandReport {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: ReportLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: ReportLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == ReportLevel::Error
    }

    fn from_error(command: &Command, err: FlagError) -> Self {
        let message = format!("{}: {}", command.name(), err);
        if err.is_cancellation() {
            info!(command = command.name(), "cancelled");
            Self::info(message)
        } else {
            error!(command = command.name(), error = %err, "command failed");
            Self::error(message)
        }
    }
}

/// The active file and the cursor line in it.
fn target(service: &FlagService) -> FlagResult<(ActiveFile, usize)> {
    let file = service
        .editor()
        .active_file()
        .ok_or(FlagError::NoActiveFile)?;
    Ok((file, service.editor().cursor_line()))
}

async fn execute(service: &FlagService, command: &Command) -> FlagResult<String> {
    match command {
        Command::AddFlag => {
            let (file, line) = target(service)?;
            let flag = service.add_flag(&file, line).await?;
            Ok(format!(
                "added {} flag on line {}",
                flag.tone.name,
                flag.line_num + 1
            ))
        }
        Command::DeleteFlag => {
            let (file, line) = target(service)?;
            let flag = service.delete_flag(&file, line).await?;
            Ok(format!(
                "deleted {} flag on line {}",
                flag.tone.name,
                flag.line_num + 1
            ))
        }
        Command::NavigateToFlag => {
            let (file, line) = target(service)?;
            let flag = service.navigate_all(&file, line)?;
            Ok(format!("moved to flag on line {}", flag.line_num + 1))
        }
        Command::SearchFlags { query } => {
            let (file, line) = target(service)?;
            let outcome = service.search_flags(&file, query, line)?;
            Ok(match (outcome.matches.len(), outcome.moved_to) {
                (0, _) if query.is_empty() => "search cleared".to_string(),
                (0, _) => format!("no flagged line matches \"{}\"", query),
                (n, Some(to)) => format!("{} match(es), moved to line {}", n, to + 1),
                (n, None) => format!("{} match(es)", n),
            })
        }
        Command::JumpToMatch => {
            let (file, line) = target(service)?;
            let flag = service.jump_to_match(&file, line)?;
            Ok(format!("moved to flag on line {}", flag.line_num + 1))
        }
        Command::PlayLineAudio => {
            let (file, line) = target(service)?;
            let cue = service.play_line_audio(Some(&file), line);
            if !service.sound_cues_enabled() {
                return Ok(format!("sound cues are off ({} not played)", cue.note));
            }
            Ok(format!("played {} (program {})", cue.note, cue.instrument))
        }
        Command::ToggleSoundCues => Ok(if service.toggle_sound_cues() {
            "sound cues on".to_string()
        } else {
            "sound cues off".to_string()
        }),
        Command::ConfigureSearchHighlight => {
            service.editor().configure_search_highlight()?;
            Ok("search highlight configuration opened".to_string())
        }
    }
}

/// Run `command` and report the outcome.
pub async fn run_command(service: &FlagService, command: Command) -> CommandReport {
    match execute(service, &command).await {
        Ok(message) => CommandReport::info(message),
        Err(err) => CommandReport::from_error(&command, err),
    }
}
