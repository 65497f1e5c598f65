//! Command-line interface for boardsync
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand is defined in its own submodule.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::backend::FileBackend;
use crate::config::Config;
use crate::error::Result;

mod replay;
mod show;
mod tag;

/// boardsync - optimistic drag-and-drop reordering
///
/// Drives the reordering engine against a JSON board document: show a
/// cached scope, replay drag gestures, edit task tags.
#[derive(Parser, Debug)]
#[command(name = "boardsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the board document (defaults to storage.board from config)
    #[arg(long, global = true, env = "BOARDSYNC_BOARD")]
    pub board: Option<PathBuf>,

    /// Path to the config file (defaults to ./.boardsync.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the ordered list of a scope (e.g. "tasks?workspace=ws1")
    Show {
        /// Scope key
        scope: String,
    },

    /// Replay a JSON-lines file of drag events against a scope
    Replay {
        /// Scope key of the sortable list
        scope: String,

        /// File with one drag event per line
        events: PathBuf,

        /// Reject every write, as a failing server would
        #[arg(long)]
        fail_writes: bool,
    },

    /// Task tag edits
    #[command(subcommand)]
    Tag(TagCommands),
}

/// Tag subcommands
#[derive(Subcommand, Debug)]
pub enum TagCommands {
    /// Add a tag to a task
    Add {
        workspace: String,
        task: String,
        tag: String,

        /// Reject the write, as a failing server would
        #[arg(long)]
        fail_writes: bool,
    },

    /// Remove a tag from a task
    Rm {
        workspace: String,
        task: String,
        tag: String,

        /// Reject the write, as a failing server would
        #[arg(long)]
        fail_writes: bool,
    },
}

/// Where the board lives and how to reach it
pub(crate) struct BoardLocation {
    pub board: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

impl BoardLocation {
    /// Load config and build the file backend.
    ///
    /// A board path from config is relative to the config file's directory.
    pub(crate) fn open(&self, fail_writes: bool) -> Result<(Config, FileBackend)> {
        let (config, base) = match &self.config {
            Some(path) => {
                let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
                (Config::load(path)?, base)
            }
            None => {
                let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                (Config::load_from_dir(&cwd)?, cwd)
            }
        };

        let board = match &self.board {
            Some(path) => path.clone(),
            None => base.join(&config.storage.board),
        };
        tracing::debug!(board = %board.display(), "opening board");

        let backend = FileBackend::new(board)
            .with_lock_timeout(config.storage.lock_timeout_ms)
            .with_fail_writes(fail_writes);
        Ok((config, backend))
    }
}

/// Single-threaded runtime: the engine's state is not `Send`.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

impl Cli {
    /// Name used in the JSON envelope, e.g. `tag rm`
    pub fn command_name(&self) -> &'static str {
        match &self.command {
            Commands::Show { .. } => "show",
            Commands::Replay { .. } => "replay",
            Commands::Tag(TagCommands::Add { .. }) => "tag add",
            Commands::Tag(TagCommands::Rm { .. }) => "tag rm",
        }
    }

    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let location = BoardLocation {
            board: self.board,
            config: self.config,
        };
        match self.command {
            Commands::Show { scope } => show::run(show::ShowOptions {
                scope,
                location,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::Replay {
                scope,
                events,
                fail_writes,
            } => replay::run(replay::ReplayOptions {
                scope,
                events,
                fail_writes,
                location,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::Tag(cmd) => match cmd {
                TagCommands::Add {
                    workspace,
                    task,
                    tag,
                    fail_writes,
                } => tag::run(tag::TagOptions {
                    workspace,
                    task,
                    tag,
                    remove: false,
                    fail_writes,
                    location,
                    json: self.json,
                    quiet: self.quiet,
                }),
                TagCommands::Rm {
                    workspace,
                    task,
                    tag,
                    fail_writes,
                } => tag::run(tag::TagOptions {
                    workspace,
                    task,
                    tag,
                    remove: true,
                    fail_writes,
                    location,
                    json: self.json,
                    quiet: self.quiet,
                }),
            },
        }
    }
}
