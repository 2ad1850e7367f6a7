//! # Line Flags CLI (`lflag`)
//!
//! Attach audio flags to lines of text files, keep them in step with edits,
//! and search or jump between them from the command line. Flags live in a
//! SQLite database keyed by each file's canonical path.
//!
//! ## Usage
//!
//! ```bash
//! lflag --config ./config/lineflags.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lflag init` | Create the SQLite database and run schema migrations |
//! | `lflag tones` | Print the tone catalog |
//! | `lflag list <file>` | Show the flags of a file |
//! | `lflag add <file> --line N` | Flag a line, prompting for a tone |
//! | `lflag delete <file> --line N` | Remove the flag on a line |
//! | `lflag next <file> --line N` | Jump to the next flag after a line |
//! | `lflag search <file> <query> --line N` | Search flagged lines |
//! | `lflag sync <file> --start N` | Re-anchor flags after the file was edited |
//! | `lflag cue <file> --line N` | Print the audio cue of a line |
//! | `lflag gc` | Drop flags of files that no longer exist |
//!
//! Line numbers are 1-based on the command line.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lineflags::{cli, config, migrate};

/// Line Flags CLI: durable, line-anchored audio flags for text files.
#[derive(Parser)]
#[command(
    name = "lflag",
    about = "Line Flags: durable, line-anchored audio flags for text files",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/lineflags.toml`.
    #[arg(long, global = true, default_value = "./config/lineflags.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Print the tone catalog.
    Tones,

    /// List the flags of a file.
    List { file: PathBuf },

    /// Flag a line.
    ///
    /// Without `--tone`, prompts on stdin when it is a terminal and
    /// otherwise cancels.
    Add {
        file: PathBuf,
        #[arg(long)]
        line: usize,
        /// Tone name, e.g. `Violin2`. Must not already be used in the file.
        #[arg(long)]
        tone: Option<String>,
    },

    /// Remove the flag on a line.
    Delete {
        file: PathBuf,
        #[arg(long)]
        line: usize,
    },

    /// Move to the next flag after `--line`, wrapping around.
    Next {
        file: PathBuf,
        #[arg(long)]
        line: usize,
        /// Only consider flagged lines containing this text.
        #[arg(long)]
        query: Option<String>,
    },

    /// Search the text of flagged lines (case-insensitive).
    Search {
        file: PathBuf,
        query: String,
        #[arg(long, default_value_t = 1)]
        line: usize,
    },

    /// Re-anchor stored flags after the file was edited elsewhere.
    ///
    /// Flags at or below `--start` shift by the change in line count.
    Sync {
        file: PathBuf,
        #[arg(long)]
        start: usize,
    },

    /// Print the audio cue for a line.
    Cue {
        file: PathBuf,
        #[arg(long)]
        line: usize,
        /// Context description for unflagged lines, e.g. "if statement".
        #[arg(long)]
        context: Option<String>,
    },

    /// Delete stored flags of files that no longer exist.
    Gc,
}

fn to_index(line: usize) -> Result<usize> {
    if line == 0 {
        bail!("line numbers start at 1");
    }
    Ok(line - 1)
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run(cfg: &config::Config, command: Commands) -> Result<()> {
    match command {
        Commands::Init => {
            migrate::run_migrations(cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Tones => cli::run_tones(),
        Commands::List { file } => {
            cli::run_list(cfg, &file).await?;
        }
        Commands::Add { file, line, tone } => {
            cli::run_add(cfg, &file, to_index(line)?, tone).await?;
        }
        Commands::Delete { file, line } => {
            cli::run_delete(cfg, &file, to_index(line)?).await?;
        }
        Commands::Next { file, line, query } => {
            cli::run_next(cfg, &file, to_index(line)?, query).await?;
        }
        Commands::Search { file, query, line } => {
            cli::run_search(cfg, &file, &query, to_index(line)?).await?;
        }
        Commands::Sync { file, start } => {
            cli::run_sync(cfg, &file, to_index(start)?).await?;
        }
        Commands::Cue {
            file,
            line,
            context,
        } => {
            cli::run_cue(cfg, &file, to_index(line)?, context).await?;
        }
        Commands::Gc => {
            cli::run_gc(cfg).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Commands that don't require config
        Commands::Tones => cli::run_tones(),
        command => {
            let cfg = config::load_config(&cli.config)?;
            init_tracing(&cfg.log.filter);
            run(&cfg, command).await?;
        }
    }

    Ok(())
}
