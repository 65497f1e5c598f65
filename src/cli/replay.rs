//! boardsync replay command implementation
//!
//! Feeds a JSON-lines script of drag events to one sortable list, commits
//! every completed gesture, then refetches and prints the resulting order.

use std::path::PathBuf;

use crate::board::{Board, DropOutcome, Handled};
use crate::drag::{DragEvent, DragTransition};
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::notify::Notice;
use crate::output::{emit_success, HumanReport, OutputOptions};
use crate::scope::ScopeKey;
use crate::sync::MutationOutcome;

use super::show::describe_list;
use super::{runtime, BoardLocation};

/// Options for `boardsync replay`
pub struct ReplayOptions {
    pub scope: String,
    pub events: PathBuf,
    pub fail_writes: bool,
    pub location: BoardLocation,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, serde::Serialize)]
struct ReplayStep {
    line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    transition: Option<DragTransition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dropped: Option<DropOutcome>,
}

#[derive(serde::Serialize)]
struct ReplayReport {
    scope: ScopeKey,
    steps: Vec<ReplayStep>,
    committed: usize,
    rolled_back: usize,
    unfinished: bool,
    entities: Vec<Entity>,
    notices: Vec<Notice>,
}

/// Parse one drag event per non-empty line
pub(crate) fn parse_events(content: &str) -> Result<Vec<(usize, DragEvent)>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str::<DragEvent>(line)
                .map(|event| (idx + 1, event))
                .map_err(|err| Error::InvalidArgument(format!("event on line {}: {err}", idx + 1)))
        })
        .collect()
}

pub fn run(options: ReplayOptions) -> Result<()> {
    let scope: ScopeKey = options.scope.parse()?;
    let content = std::fs::read_to_string(&options.events)?;
    let events = parse_events(&content)?;

    let (config, backend) = options.location.open(options.fail_writes)?;
    let board = Board::new(backend, &config)?;

    let (steps, unfinished, entities) = runtime()?.block_on(async {
        board.read(&scope).await?;
        let mut list = board.sortable(scope.clone());

        let mut steps = Vec::with_capacity(events.len());
        for (line, event) in events {
            let step = match list.handle(event).await? {
                Handled::Transition(transition) => ReplayStep {
                    line,
                    transition: Some(transition),
                    dropped: None,
                },
                Handled::Dropped(outcome) => ReplayStep {
                    line,
                    transition: None,
                    dropped: Some(outcome),
                },
            };
            steps.push(step);
        }
        let unfinished = list.is_dragging();

        board.refresh().await?;
        let entities = board.read(&scope).await?;
        Ok::<_, Error>((steps, unfinished, entities))
    })?;

    let outcomes: Vec<&MutationOutcome> = steps
        .iter()
        .filter_map(|step| match &step.dropped {
            Some(DropOutcome::Committed { outcome, .. }) => Some(outcome),
            _ => None,
        })
        .collect();
    let committed = outcomes.iter().filter(|outcome| outcome.is_applied()).count();
    let rolled_back = outcomes.len() - committed;
    let notices = board.notices().drain();

    let mut human = HumanReport::new(format!("boardsync replay: {scope}"));
    human
        .field("events", steps.len())
        .field("committed", committed)
        .field("rolled back", rolled_back);
    for step in &steps {
        human.line(format!("line {}: {}", step.line, describe_step(step)));
    }
    for line in describe_list(&entities) {
        human.line(format!("order {line}"));
    }
    for notice in &notices {
        human.warn(notice.message.clone());
    }
    if unfinished {
        human.warn("script ended mid-gesture; staged order discarded");
    }
    if rolled_back > 0 {
        human.hint(format!("boardsync show {scope}"));
    }

    let report = ReplayReport {
        scope: scope.clone(),
        steps,
        committed,
        rolled_back,
        unfinished,
        entities,
        notices,
    };
    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "replay",
        &report,
        &human,
    )
}

fn describe_step(step: &ReplayStep) -> String {
    if let Some(outcome) = &step.dropped {
        return match outcome {
            DropOutcome::Discarded => "drop, nothing to save".to_string(),
            DropOutcome::Committed { batch, outcome } => format!(
                "drop, {} position update(s) {}",
                batch.updates.len(),
                if outcome.is_applied() { "saved" } else { "rolled back" }
            ),
            DropOutcome::Unresolved { reason } => format!("drop refused: {reason}"),
        };
    }

    match &step.transition {
        Some(DragTransition::Started { active }) => format!("start {active}"),
        Some(DragTransition::Reordered { active, from, to }) => {
            format!("move {active} from {from} to {to}")
        }
        Some(DragTransition::ContainerChanged { active, from, to }) => format!(
            "move {active} from {} to {}",
            from.as_deref().unwrap_or("-"),
            to.as_deref().unwrap_or("-")
        ),
        Some(DragTransition::Vetoed { active, .. }) => {
            format!("reverse move of {active} refused during cooldown")
        }
        Some(DragTransition::Rejected { active, reason }) => {
            format!("change to {active} rejected: {reason}")
        }
        Some(DragTransition::Ignored { reason }) => format!("ignored: {reason}"),
        Some(DragTransition::Committed { .. }) | Some(DragTransition::Discarded) | None => {
            "end".to_string()
        }
    }
}
