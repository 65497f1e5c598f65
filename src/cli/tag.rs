//! boardsync tag command implementation
//!
//! Adds or removes a task tag optimistically, across every cached view of
//! the workspace's tasks, and reports whether the edit stuck.

use crate::board::Board;
use crate::entity::{index_of, Entity, EntityEdit, EntityKind};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanReport, OutputOptions};
use crate::scope::ScopeKey;
use crate::sync::MutationOutcome;

use super::{runtime, BoardLocation};

/// Options for `boardsync tag add|rm`
pub struct TagOptions {
    pub workspace: String,
    pub task: String,
    pub tag: String,
    pub remove: bool,
    pub fail_writes: bool,
    pub location: BoardLocation,
    pub json: bool,
    pub quiet: bool,
}

#[derive(serde::Serialize)]
struct TagReport {
    edit: EntityEdit,
    outcome: MutationOutcome,
    task: Entity,
}

pub fn run(options: TagOptions) -> Result<()> {
    let edit = if options.remove {
        EntityEdit::RemoveTag(options.tag.clone())
    } else {
        EntityEdit::AddTag(options.tag.clone())
    };
    let command = if options.remove { "tag rm" } else { "tag add" };

    let (config, backend) = options.location.open(options.fail_writes)?;
    let board = Board::new(backend, &config)?;
    let scope = ScopeKey::tasks(&options.workspace);
    let tagged = ScopeKey::tasks(&options.workspace).with(crate::scope::TAG_PARAM, &options.tag);

    let (outcome, task) = runtime()?.block_on(async {
        let tasks = board.read(&scope).await?;
        if index_of(&tasks, &options.task).is_none() {
            return Err(Error::EntityNotFound(format!(
                "task {} in workspace {}",
                options.task, options.workspace
            )));
        }
        // Keep the filtered view cached so the edit patches both lists.
        board.read(&tagged).await?;

        let outcome = board.edit(EntityKind::Task, &options.task, &edit).await?;
        board.refresh().await?;
        let tasks = board.read(&scope).await?;
        let task = index_of(&tasks, &options.task)
            .map(|idx| tasks[idx].clone())
            .ok_or_else(|| Error::EntityNotFound(format!("task {}", options.task)))?;
        Ok((outcome, task))
    })?;

    let mut human = HumanReport::new(format!("boardsync {command}: {}", options.task));
    human
        .field("edit", edit.describe())
        .field("status", if outcome.is_applied() { "saved" } else { "rolled back" })
        .field("tags", task.tags.join(", "));
    for notice in board.notices().drain() {
        human.warn(notice.message);
    }
    if !outcome.is_applied() {
        human.hint(format!("boardsync show {scope}"));
    }

    let report = TagReport {
        edit,
        outcome,
        task,
    };
    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        command,
        &report,
        &human,
    )
}
