//! Drag session controller.
//!
//! Owns at most one active drag for one sortable list and turns the stream
//! of drag events into a *staged* ordering, kept apart from the committed
//! cache until the gesture ends.
//!
//! ```text
//! Idle --start--> Dragging --over--> Dragging --end--> Idle
//!                                                (Committed | Discarded)
//! ```
//!
//! Handling an event is synchronous and never touches the cache: drag-over
//! fires on every pointer move and must not stall pointer tracking.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::entity::{index_of, occurrences, ContainerId, Entity, EntityId, EntityKind};
use crate::guard::{GuardDecision, MoveGuard};
use crate::scope::ScopeKey;

/// What the pointer is hovering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DragTarget {
    /// Another orderable entity
    Entity { id: EntityId, kind: EntityKind },
    /// A container itself (e.g. the empty area of a column)
    Container { id: ContainerId },
}

/// Drag lifecycle event emitted by the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DragEvent {
    Start { active: EntityId },
    Over { active: EntityId, target: DragTarget },
    End,
}

/// Result of feeding one event to the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum DragTransition {
    Started {
        active: EntityId,
    },
    Reordered {
        active: EntityId,
        from: usize,
        to: usize,
    },
    ContainerChanged {
        active: EntityId,
        from: Option<ContainerId>,
        to: Option<ContainerId>,
    },
    /// Container move refused by the guard
    Vetoed {
        active: EntityId,
        from: Option<ContainerId>,
        to: Option<ContainerId>,
    },
    /// Staged change discarded because it broke the list invariants
    Rejected {
        active: EntityId,
        reason: String,
    },
    Ignored {
        reason: String,
    },
    /// Gesture ended with a changed order that must be committed
    Committed {
        staged: Vec<Entity>,
    },
    /// Gesture ended without an effective change
    Discarded,
}

impl DragTransition {
    fn ignored(reason: impl Into<String>) -> Self {
        DragTransition::Ignored {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
enum DragState {
    Idle,
    Dragging {
        active: Entity,
        staged: Option<Vec<Entity>>,
    },
}

/// Move the element at `from` so that it ends up at index `to`.
pub fn array_move<T>(list: &mut Vec<T>, from: usize, to: usize) {
    if from == to || from >= list.len() || to >= list.len() {
        return;
    }
    let item = list.remove(from);
    list.insert(to, item);
}

#[derive(Debug)]
pub struct DragController {
    store: CacheStore,
    scope: ScopeKey,
    guard: MoveGuard,
    state: DragState,
}

impl DragController {
    pub fn new(store: CacheStore, scope: ScopeKey, guard: MoveGuard) -> Self {
        Self {
            store,
            scope,
            guard,
            state: DragState::Idle,
        }
    }

    pub fn scope(&self) -> &ScopeKey {
        &self.scope
    }

    pub fn kind(&self) -> EntityKind {
        self.scope.kind()
    }

    pub fn guard(&self) -> &MoveGuard {
        &self.guard
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Entity being dragged, for the overlay
    pub fn active(&self) -> Option<&Entity> {
        match &self.state {
            DragState::Dragging { active, .. } => Some(active),
            DragState::Idle => None,
        }
    }

    pub fn staged(&self) -> Option<&[Entity]> {
        match &self.state {
            DragState::Dragging {
                staged: Some(staged),
                ..
            } => Some(staged),
            _ => None,
        }
    }

    /// The list to render: staged while a change is pending, else the cache
    pub fn displayed(&self) -> Vec<Entity> {
        match self.staged() {
            Some(staged) => staged.to_vec(),
            None => self.committed(),
        }
    }

    fn committed(&self) -> Vec<Entity> {
        self.store.get(&self.scope).unwrap_or_default()
    }

    pub fn handle(&mut self, event: DragEvent) -> DragTransition {
        self.handle_at(event, Instant::now())
    }

    pub fn handle_at(&mut self, event: DragEvent, now: Instant) -> DragTransition {
        match event {
            DragEvent::Start { active } => self.drag_start(&active),
            DragEvent::Over { active, target } => self.drag_over_at(&active, &target, now),
            DragEvent::End => self.drag_end(),
        }
    }

    pub fn drag_start(&mut self, active_id: &str) -> DragTransition {
        if self.is_dragging() {
            debug!(scope = %self.scope, "new drag replaces unfinished session");
        }
        self.state = DragState::Idle;
        self.guard.reset();

        let displayed = self.displayed();
        let Some(idx) = index_of(&displayed, active_id) else {
            return DragTransition::ignored(format!("{active_id} is not in {}", self.scope));
        };
        let active = displayed[idx].clone();
        debug!(scope = %self.scope, active = %active.id, "drag started");
        self.state = DragState::Dragging {
            active,
            staged: None,
        };
        DragTransition::Started {
            active: active_id.to_string(),
        }
    }

    pub fn drag_over(&mut self, active_id: &str, target: &DragTarget) -> DragTransition {
        self.drag_over_at(active_id, target, Instant::now())
    }

    pub fn drag_over_at(&mut self, active_id: &str, target: &DragTarget, now: Instant) -> DragTransition {
        match &self.state {
            DragState::Idle => return DragTransition::ignored("no active drag"),
            DragState::Dragging { active, .. } if active.id != active_id => {
                return DragTransition::ignored(format!(
                    "event for {active_id} while dragging {}",
                    active.id
                ));
            }
            DragState::Dragging { .. } => {}
        }

        let current = self.displayed();
        let Some(active_idx) = index_of(&current, active_id) else {
            return self.reject(active_id, "active entity missing from displayed list");
        };

        match target {
            DragTarget::Entity { id, kind } => {
                if *kind != self.kind() {
                    return DragTransition::ignored(format!(
                        "{kind} target cannot receive a {}",
                        self.kind()
                    ));
                }
                if id == active_id {
                    return DragTransition::ignored("hovering itself");
                }
                let Some(target_idx) = index_of(&current, id) else {
                    return DragTransition::ignored(format!("{id} is not in {}", self.scope));
                };

                if current[active_idx].shares_container(&current[target_idx]) {
                    let mut staged = current.clone();
                    array_move(&mut staged, active_idx, target_idx);
                    self.accept(
                        active_id,
                        current.len(),
                        staged,
                        DragTransition::Reordered {
                            active: active_id.to_string(),
                            from: active_idx,
                            to: target_idx,
                        },
                    )
                } else {
                    let to = current[target_idx].container_id.clone();
                    self.move_container(active_id, current, active_idx, to, now)
                }
            }
            DragTarget::Container { id } => {
                if self.kind().container_kind().is_none() {
                    return DragTransition::ignored(format!(
                        "{} entities have no containers",
                        self.kind()
                    ));
                }
                if current[active_idx].container_id.as_deref() == Some(id.as_str()) {
                    return DragTransition::ignored("already in container");
                }
                self.move_container(active_id, current, active_idx, Some(id.clone()), now)
            }
        }
    }

    fn move_container(
        &mut self,
        active_id: &str,
        current: Vec<Entity>,
        active_idx: usize,
        to: Option<ContainerId>,
        now: Instant,
    ) -> DragTransition {
        let from = current[active_idx].container_id.clone();
        if self.guard.check_at(from.as_deref(), to.as_deref(), now) == GuardDecision::Vetoed {
            return DragTransition::Vetoed {
                active: active_id.to_string(),
                from,
                to,
            };
        }

        let expected_len = current.len();
        let mut staged = current;
        let mut moved = staged.remove(active_idx);
        moved.container_id = to.clone();
        staged.push(moved);
        self.accept(
            active_id,
            expected_len,
            staged,
            DragTransition::ContainerChanged {
                active: active_id.to_string(),
                from,
                to,
            },
        )
    }

    fn accept(
        &mut self,
        active_id: &str,
        expected_len: usize,
        staged: Vec<Entity>,
        transition: DragTransition,
    ) -> DragTransition {
        let count = occurrences(&staged, active_id);
        if count != 1 {
            return self.reject(
                active_id,
                &format!("active entity appears {count} times in staged list"),
            );
        }
        if staged.len() != expected_len {
            return self.reject(
                active_id,
                &format!("staged list has {} entries, expected {expected_len}", staged.len()),
            );
        }

        let moved = staged
            .iter()
            .find(|entity| entity.id == active_id)
            .cloned();
        if let DragState::Dragging { active, staged: slot } = &mut self.state {
            if let Some(moved) = moved {
                *active = moved;
            }
            *slot = Some(staged);
        }
        debug!(scope = %self.scope, ?transition, "staged order updated");
        transition
    }

    fn reject(&self, active_id: &str, reason: &str) -> DragTransition {
        warn!(scope = %self.scope, active = active_id, reason, "discarding staged change");
        DragTransition::Rejected {
            active: active_id.to_string(),
            reason: reason.to_string(),
        }
    }

    /// End the gesture. The session is cleared whatever happens next.
    pub fn drag_end(&mut self) -> DragTransition {
        let state = std::mem::replace(&mut self.state, DragState::Idle);
        self.guard.reset();

        let staged = match state {
            DragState::Idle => return DragTransition::Discarded,
            DragState::Dragging { staged: None, .. } => return DragTransition::Discarded,
            DragState::Dragging {
                staged: Some(staged),
                ..
            } => staged,
        };

        if same_arrangement(&staged, &self.committed()) {
            debug!(scope = %self.scope, "dropped at origin");
            return DragTransition::Discarded;
        }
        DragTransition::Committed { staged }
    }
}

fn same_arrangement(a: &[Entity], b: &[Entity]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| x.id == y.id && x.container_id == y.container_id)
}
