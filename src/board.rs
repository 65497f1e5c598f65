//! UI-facing surface of the engine.
//!
//! [`Board`] is created once at startup: it owns the shared cache store,
//! the notice log, the synchronizer and the backend. Each sortable list in
//! the UI (workspaces in the sidebar, columns of a board, tasks across a
//! board's columns) is a [`SortableList`] obtained from it, exposing the
//! three drag handlers plus what to render.

use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::backend::{EntityEndpoint, ListProvider, PositionEndpoint};
use crate::cache::CacheStore;
use crate::config::Config;
use crate::drag::{DragController, DragEvent, DragTarget, DragTransition};
use crate::entity::{Entity, EntityEdit, EntityKind};
use crate::error::{Error, Result};
use crate::guard::MoveGuard;
use crate::notify::{Notice, NoticeLog, Notifier};
use crate::reconcile::{self, PositionBatch};
use crate::scope::ScopeKey;
use crate::sync::{MutationOutcome, Synchronizer};

/// What happened when a gesture ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DropOutcome {
    /// Nothing to commit
    Discarded,
    /// A batch was sent; `outcome` says whether it stuck
    Committed {
        batch: PositionBatch,
        outcome: MutationOutcome,
    },
    /// No cached scope could own the batch; nothing was written
    Unresolved { reason: String },
}

impl DropOutcome {
    pub fn batch(&self) -> Option<&PositionBatch> {
        match self {
            DropOutcome::Committed { batch, .. } => Some(batch),
            _ => None,
        }
    }
}

/// Result of [`SortableList::handle`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    Transition(DragTransition),
    Dropped(DropOutcome),
}

/// One sortable list wired to the shared cache and the backend
pub struct SortableList<B> {
    controller: DragController,
    sync: Synchronizer,
    backend: Rc<B>,
}

impl<B> SortableList<B>
where
    B: ListProvider + PositionEndpoint,
{
    pub fn new(sync: Synchronizer, backend: Rc<B>, scope: ScopeKey, guard: MoveGuard) -> Self {
        let controller = DragController::new(sync.store().clone(), scope, guard);
        Self {
            controller,
            sync,
            backend,
        }
    }

    pub fn scope(&self) -> &ScopeKey {
        self.controller.scope()
    }

    /// Populate (or refetch, if stale) this list's cache entry
    pub async fn load(&self) -> Result<Vec<Entity>> {
        self.sync
            .store()
            .read(self.controller.scope(), self.backend.as_ref())
            .await
    }

    /// The list to render
    pub fn displayed(&self) -> Vec<Entity> {
        self.controller.displayed()
    }

    /// The rendered entities of one container, in order
    pub fn displayed_in(&self, container: &str) -> Vec<Entity> {
        self.controller
            .displayed()
            .into_iter()
            .filter(|entity| entity.container_id.as_deref() == Some(container))
            .collect()
    }

    /// The dragged entity, for the overlay
    pub fn active(&self) -> Option<&Entity> {
        self.controller.active()
    }

    pub fn is_dragging(&self) -> bool {
        self.controller.is_dragging()
    }

    pub fn on_drag_start(&mut self, active: &str) -> DragTransition {
        self.controller.drag_start(active)
    }

    pub fn on_drag_over(&mut self, active: &str, target: &DragTarget) -> DragTransition {
        self.controller.drag_over(active, target)
    }

    pub fn on_drag_over_at(&mut self, active: &str, target: &DragTarget, now: Instant) -> DragTransition {
        self.controller.drag_over_at(active, target, now)
    }

    /// End the gesture and commit any staged change.
    ///
    /// The drag session is cleared before the commit starts. A scope that
    /// cannot be resolved becomes a notice, not an error.
    pub async fn on_drag_end(&mut self) -> Result<DropOutcome> {
        let staged = match self.controller.drag_end() {
            DragTransition::Committed { staged } => staged,
            _ => return Ok(DropOutcome::Discarded),
        };
        self.commit(staged).await
    }

    async fn commit(&self, staged: Vec<Entity>) -> Result<DropOutcome> {
        let scope = self.controller.scope().clone();
        let planned = self
            .sync
            .store()
            .with(|cache| reconcile::plan(cache, &scope, &staged));

        let batch = match planned {
            Ok(batch) => batch,
            Err(err @ Error::ScopeUnresolved { .. }) => {
                self.sync
                    .notifier()
                    .notify(Notice::error(format!("could not save order: {err}")));
                return Ok(DropOutcome::Unresolved {
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        };

        debug!(scope = %scope, updates = batch.updates.len(), "committing staged order");
        let outcome = self
            .sync
            .commit_positions(&scope, &staged, &batch, self.backend.as_ref())
            .await?;
        Ok(DropOutcome::Committed { batch, outcome })
    }

    pub async fn handle(&mut self, event: DragEvent) -> Result<Handled> {
        self.handle_at(event, Instant::now()).await
    }

    /// Feed one event, using `now` for the container-move guard
    pub async fn handle_at(&mut self, event: DragEvent, now: Instant) -> Result<Handled> {
        match event {
            DragEvent::End => Ok(Handled::Dropped(self.on_drag_end().await?)),
            other => Ok(Handled::Transition(self.controller.handle_at(other, now))),
        }
    }
}

/// Application-wide bundle: one cache, one notice log, one backend
pub struct Board<B> {
    store: CacheStore,
    notices: NoticeLog,
    sync: Synchronizer,
    backend: Rc<B>,
    cooldown: Duration,
}

impl<B> Board<B> {
    pub fn new(backend: B, config: &Config) -> Result<Self> {
        let cooldown = config.guard.cooldown()?;
        let store = CacheStore::new();
        let notices = NoticeLog::new();
        let notifier: Rc<dyn Notifier> = Rc::new(notices.clone());
        let sync = Synchronizer::new(store.clone(), notifier);
        Ok(Self {
            store,
            notices,
            sync,
            backend: Rc::new(backend),
            cooldown,
        })
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn notices(&self) -> &NoticeLog {
        &self.notices
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }
}

impl<B> Board<B>
where
    B: ListProvider,
{
    /// Read a scope through the cache
    pub async fn read(&self, scope: &ScopeKey) -> Result<Vec<Entity>> {
        self.store.read(scope, self.backend.as_ref()).await
    }

    /// Refetch every invalidated scope
    pub async fn refresh(&self) -> Result<Vec<ScopeKey>> {
        self.store.refresh_stale(self.backend.as_ref()).await
    }
}

impl<B> Board<B>
where
    B: ListProvider + PositionEndpoint,
{
    pub fn sortable(&self, scope: ScopeKey) -> SortableList<B> {
        SortableList::new(
            self.sync.clone(),
            Rc::clone(&self.backend),
            scope,
            MoveGuard::new(self.cooldown),
        )
    }
}

impl<B> Board<B>
where
    B: EntityEndpoint,
{
    /// Optimistically edit one entity in every cached view that shows it
    pub async fn edit(&self, kind: EntityKind, id: &str, edit: &EntityEdit) -> Result<MutationOutcome> {
        self.sync
            .update_entity(kind, id, edit, self.backend.as_ref())
            .await
    }
}
