//! boardsync show command implementation
//!
//! Loads one scope through the cache and prints it in display order.

use crate::board::Board;
use crate::entity::Entity;
use crate::error::Result;
use crate::output::{emit_success, HumanReport, OutputOptions};
use crate::reconcile::group_by_container;
use crate::scope::ScopeKey;

use super::{runtime, BoardLocation};

/// Options for `boardsync show`
pub struct ShowOptions {
    pub scope: String,
    pub location: BoardLocation,
    pub json: bool,
    pub quiet: bool,
}

#[derive(serde::Serialize)]
struct ShowReport {
    scope: ScopeKey,
    entities: Vec<Entity>,
}

pub fn run(options: ShowOptions) -> Result<()> {
    let scope: ScopeKey = options.scope.parse()?;
    let (config, backend) = options.location.open(false)?;
    let board = Board::new(backend, &config)?;

    let entities = runtime()?.block_on(board.read(&scope))?;

    let mut human = HumanReport::new(format!("boardsync show: {scope}"));
    human.field(scope.kind().plural(), entities.len());
    for line in describe_list(&entities) {
        human.line(line);
    }
    if entities.is_empty() {
        human.warn(format!("no {} in this scope", scope.kind().plural()));
    }

    let report = ShowReport { scope, entities };
    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "show",
        &report,
        &human,
    )
}

/// One line per container: `T1: t1, t2`, or a single line for top-level lists
pub(crate) fn describe_list(entities: &[Entity]) -> Vec<String> {
    group_by_container(entities)
        .into_iter()
        .map(|(container, members)| {
            let ids: Vec<&str> = members.iter().map(|entity| entity.id.as_str()).collect();
            match container {
                Some(container) => format!("{container}: {}", ids.join(", ")),
                None => ids.join(", "),
            }
        })
        .collect()
}
