//! External collaborators of the reordering engine.
//!
//! The engine only depends on three contracts:
//! - [`ListProvider`]: fetch the canonical list for a scope
//! - [`PositionEndpoint`]: persist one batch of position updates atomically
//! - [`EntityEndpoint`]: persist a single field-level edit
//!
//! Two implementations are provided over the same [`BoardDocument`] model:
//! [`MemoryBackend`] for embedding and tests (with failure injection), and
//! [`FileBackend`] which keeps the document in a locked JSON file.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entity::{ensure_unique, index_of, Entity, EntityEdit, EntityKind};
use crate::error::{Error, Result};
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};
use crate::reconcile::PositionBatch;
use crate::scope::{ScopeKey, TAG_PARAM};

/// Source of canonical lists, used to populate and refetch the cache
#[allow(async_fn_in_trait)]
pub trait ListProvider {
    async fn fetch(&self, scope: &ScopeKey) -> Result<Vec<Entity>>;
}

/// Batch position-update endpoint
///
/// The whole batch is one unit of optimism: no partial success is assumed.
#[allow(async_fn_in_trait)]
pub trait PositionEndpoint {
    async fn update_positions(&self, batch: &PositionBatch) -> Result<()>;
}

/// Single-entity mutation endpoint (tags, title)
#[allow(async_fn_in_trait)]
pub trait EntityEndpoint {
    async fn update_entity(&self, kind: EntityKind, id: &str, edit: &EntityEdit) -> Result<()>;
}

/// Columns and tasks of one workspace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceBoard {
    #[serde(default)]
    pub columns: Vec<Entity>,
    #[serde(default)]
    pub tasks: Vec<Entity>,
}

/// Server-side truth: workspaces plus one board per workspace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardDocument {
    #[serde(default)]
    pub workspaces: Vec<Entity>,
    #[serde(default)]
    pub boards: BTreeMap<String, WorkspaceBoard>,
}

impl BoardDocument {
    /// Check kinds, containers, id uniqueness and that no two entities
    /// share a position within one container.
    pub fn validate(&self) -> Result<()> {
        ensure_kind(&self.workspaces, EntityKind::Workspace)?;
        ensure_unique(&self.workspaces, "workspaces")?;
        ensure_distinct_positions(&self.workspaces, "workspaces")?;
        for (workspace, board) in &self.boards {
            if index_of(&self.workspaces, workspace).is_none() {
                return Err(Error::EntityNotFound(format!("workspace {workspace}")));
            }
            ensure_kind(&board.columns, EntityKind::Column)?;
            ensure_kind(&board.tasks, EntityKind::Task)?;
            ensure_unique(&board.columns, &ScopeKey::columns(workspace).to_string())?;
            ensure_unique(&board.tasks, &ScopeKey::tasks(workspace).to_string())?;
            for task in &board.tasks {
                let column = task.container_id.as_deref().ok_or_else(|| {
                    Error::InvalidArgument(format!("task {} has no column", task.id))
                })?;
                if index_of(&board.columns, column).is_none() {
                    return Err(Error::EntityNotFound(format!(
                        "column {column} (task {})",
                        task.id
                    )));
                }
            }
            ensure_distinct_positions(&board.columns, &format!("workspace {workspace}"))?;
            ensure_distinct_positions(&board.tasks, &format!("workspace {workspace}"))?;
        }
        Ok(())
    }

    fn board(&self, scope: &ScopeKey) -> Result<&WorkspaceBoard> {
        let workspace = scope.workspace().ok_or_else(|| {
            Error::InvalidScope(format!("{scope} requires a workspace parameter"))
        })?;
        self.boards
            .get(workspace)
            .ok_or_else(|| Error::EntityNotFound(format!("workspace {workspace}")))
    }

    fn board_mut(&mut self, scope: &ScopeKey) -> Result<&mut WorkspaceBoard> {
        let workspace = scope.workspace().ok_or_else(|| {
            Error::InvalidScope(format!("{scope} requires a workspace parameter"))
        })?;
        self.boards
            .get_mut(workspace)
            .ok_or_else(|| Error::EntityNotFound(format!("workspace {workspace}")))
    }

    /// The ordered list a client would receive for `scope`.
    ///
    /// Tasks are ordered by their column's position, then their own.
    pub fn list(&self, scope: &ScopeKey) -> Result<Vec<Entity>> {
        match scope.kind() {
            EntityKind::Workspace => Ok(sorted_by_position(self.workspaces.clone())),
            EntityKind::Column => Ok(sorted_by_position(self.board(scope)?.columns.clone())),
            EntityKind::Task => {
                let board = self.board(scope)?;
                let column_rank: HashMap<&str, i64> = board
                    .columns
                    .iter()
                    .map(|column| (column.id.as_str(), column.position))
                    .collect();
                let tag = scope.param(TAG_PARAM);
                let mut tasks: Vec<Entity> = board
                    .tasks
                    .iter()
                    .filter(|task| tag.map(|tag| task.has_tag(tag)).unwrap_or(true))
                    .cloned()
                    .collect();
                tasks.sort_by_key(|task| {
                    let rank = task
                        .container_id
                        .as_deref()
                        .and_then(|column| column_rank.get(column).copied())
                        .unwrap_or(i64::MAX);
                    (rank, task.position)
                });
                Ok(tasks)
            }
        }
    }

    fn entities_mut(&mut self, kind: EntityKind, scope: &ScopeKey) -> Result<&mut Vec<Entity>> {
        match kind {
            EntityKind::Workspace => Ok(&mut self.workspaces),
            EntityKind::Column => Ok(&mut self.board_mut(scope)?.columns),
            EntityKind::Task => Ok(&mut self.board_mut(scope)?.tasks),
        }
    }

    /// Apply a position batch. Either every update applies or none does.
    ///
    /// The result must still validate: a batch that numbers only part of a
    /// container (as one built from a filtered view does) collides with the
    /// entities it left out and is refused whole.
    pub fn apply_positions(&mut self, batch: &PositionBatch) -> Result<()> {
        let mut next = self.clone();
        next.write_positions(batch)?;
        next.validate()?;
        *self = next;
        Ok(())
    }

    fn write_positions(&mut self, batch: &PositionBatch) -> Result<()> {
        if batch.kind != batch.scope.kind() {
            return Err(Error::InvalidArgument(format!(
                "{} batch sent to {} scope",
                batch.kind, batch.scope
            )));
        }
        let known_columns: Vec<String> = match batch.kind {
            EntityKind::Task => self
                .board(&batch.scope)?
                .columns
                .iter()
                .map(|column| column.id.clone())
                .collect(),
            _ => Vec::new(),
        };
        let scope = batch.scope.clone();
        let entities = self.entities_mut(batch.kind, &scope)?;

        for update in &batch.updates {
            if index_of(entities, &update.id).is_none() {
                return Err(Error::EntityNotFound(format!("{} {}", batch.kind, update.id)));
            }
            if let Some(column) = update.container_id.as_deref() {
                if !known_columns.iter().any(|known| known == column) {
                    return Err(Error::EntityNotFound(format!("column {column}")));
                }
            }
        }

        for update in &batch.updates {
            if let Some(idx) = index_of(entities, &update.id) {
                let entity = &mut entities[idx];
                entity.position = update.position;
                if update.container_id.is_some() {
                    entity.container_id = update.container_id.clone();
                }
            }
        }
        Ok(())
    }

    /// Apply a field-level edit to every copy of the entity.
    pub fn apply_edit(&mut self, kind: EntityKind, id: &str, edit: &EntityEdit) -> Result<()> {
        let mut found = false;
        let lists: Vec<&mut Vec<Entity>> = match kind {
            EntityKind::Workspace => vec![&mut self.workspaces],
            EntityKind::Column => self.boards.values_mut().map(|b| &mut b.columns).collect(),
            EntityKind::Task => self.boards.values_mut().map(|b| &mut b.tasks).collect(),
        };
        for list in lists {
            for entity in list.iter_mut().filter(|entity| entity.id == id) {
                edit.apply(entity);
                found = true;
            }
        }
        if !found {
            return Err(Error::EntityNotFound(format!("{kind} {id}")));
        }
        Ok(())
    }
}

fn ensure_kind(list: &[Entity], kind: EntityKind) -> Result<()> {
    match list.iter().find(|entity| entity.kind != kind) {
        Some(entity) => Err(Error::InvalidArgument(format!(
            "{} is a {}, expected {kind}",
            entity.id, entity.kind
        ))),
        None => Ok(()),
    }
}

/// Positions are unique per container; entities without one share a
/// single implicit container.
fn ensure_distinct_positions(list: &[Entity], owner: &str) -> Result<()> {
    let mut seen: HashMap<(Option<&str>, i64), &str> = HashMap::new();
    for entity in list {
        let slot = (entity.container_id.as_deref(), entity.position);
        if let Some(other) = seen.insert(slot, entity.id.as_str()) {
            let place = match slot.0 {
                Some(container) => format!("column {container}"),
                None => owner.to_string(),
            };
            return Err(Error::InvalidArgument(format!(
                "{other} and {} both at position {} in {place}",
                entity.id, entity.position
            )));
        }
    }
    Ok(())
}

fn sorted_by_position(mut list: Vec<Entity>) -> Vec<Entity> {
    list.sort_by_key(|entity| entity.position);
    list
}

/// In-process backend holding a [`BoardDocument`] in memory
#[derive(Debug, Default)]
pub struct MemoryBackend {
    doc: RefCell<BoardDocument>,
    fail_writes: Cell<bool>,
    fail_reads: Cell<bool>,
    batches: RefCell<Vec<PositionBatch>>,
    fetches: Cell<usize>,
}

impl MemoryBackend {
    pub fn new(doc: BoardDocument) -> Self {
        Self {
            doc: RefCell::new(doc),
            ..Self::default()
        }
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.set(fail);
    }

    /// Copy of the current document
    pub fn document(&self) -> BoardDocument {
        self.doc.borrow().clone()
    }

    /// Every position batch received, including rejected ones
    pub fn batches(&self) -> Vec<PositionBatch> {
        self.batches.borrow().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }
}

impl ListProvider for MemoryBackend {
    async fn fetch(&self, scope: &ScopeKey) -> Result<Vec<Entity>> {
        self.fetches.set(self.fetches.get() + 1);
        if self.fail_reads.get() {
            return Err(Error::PersistFailed(format!("fetch {scope} rejected")));
        }
        self.doc.borrow().list(scope)
    }
}

impl PositionEndpoint for MemoryBackend {
    async fn update_positions(&self, batch: &PositionBatch) -> Result<()> {
        self.batches.borrow_mut().push(batch.clone());
        if self.fail_writes.get() {
            return Err(Error::PersistFailed(format!(
                "position update for {} rejected",
                batch.scope
            )));
        }
        self.doc.borrow_mut().apply_positions(batch)
    }
}

impl EntityEndpoint for MemoryBackend {
    async fn update_entity(&self, kind: EntityKind, id: &str, edit: &EntityEdit) -> Result<()> {
        if self.fail_writes.get() {
            return Err(Error::PersistFailed(format!("update of {kind} {id} rejected")));
        }
        self.doc.borrow_mut().apply_edit(kind, id, edit)
    }
}

/// Backend persisting the board document as a locked JSON file
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
    lock_timeout_ms: u64,
    fail_writes: bool,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            fail_writes: false,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    /// Reject every write without touching the file
    pub fn with_fail_writes(mut self, fail: bool) -> Self {
        self.fail_writes = fail;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and validate the document
    pub fn load(&self) -> Result<BoardDocument> {
        let raw = lock::read_locked(&self.path, self.lock_timeout_ms)?
            .ok_or_else(|| Error::InvalidArgument(format!("board file not found: {}", self.path.display())))?;
        let doc: BoardDocument = serde_json::from_str(&raw)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Write `doc` after validating it
    pub fn save(&self, doc: &BoardDocument) -> Result<()> {
        doc.validate()?;
        let json = serde_json::to_string_pretty(doc)?;
        lock::update_locked(&self.path, self.lock_timeout_ms, |_| Ok(json))
    }

    fn modify<F>(&self, what: &str, change: F) -> Result<()>
    where
        F: FnOnce(&mut BoardDocument) -> Result<()>,
    {
        if self.fail_writes {
            return Err(Error::PersistFailed(format!("{what} rejected")));
        }
        lock::update_locked(&self.path, self.lock_timeout_ms, |current| {
            let raw = current.ok_or_else(|| {
                Error::InvalidArgument(format!("board file not found: {}", self.path.display()))
            })?;
            let mut doc: BoardDocument = serde_json::from_str(&raw)?;
            change(&mut doc)?;
            doc.validate()?;
            debug!(path = %self.path.display(), what, "writing board document");
            Ok(serde_json::to_string_pretty(&doc)?)
        })
    }
}

impl ListProvider for FileBackend {
    async fn fetch(&self, scope: &ScopeKey) -> Result<Vec<Entity>> {
        self.load()?.list(scope)
    }
}

impl PositionEndpoint for FileBackend {
    async fn update_positions(&self, batch: &PositionBatch) -> Result<()> {
        self.modify(&format!("position update for {}", batch.scope), |doc| {
            doc.apply_positions(batch)
        })
    }
}

impl EntityEndpoint for FileBackend {
    async fn update_entity(&self, kind: EntityKind, id: &str, edit: &EntityEdit) -> Result<()> {
        self.modify(&format!("update of {kind} {id}"), |doc| doc.apply_edit(kind, id, edit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::PositionUpdate;

    fn doc() -> BoardDocument {
        let mut boards = BTreeMap::new();
        boards.insert(
            "ws1".to_string(),
            WorkspaceBoard {
                columns: vec![Entity::column("T2", 1), Entity::column("T1", 0)],
                tasks: vec![
                    Entity::task("t4", "T2", 0),
                    Entity::task("t2", "T1", 1).with_tags(["bug"]),
                    Entity::task("t1", "T1", 0),
                ],
            },
        );
        BoardDocument {
            workspaces: vec![Entity::workspace("ws1", 0)],
            boards,
        }
    }

    #[test]
    fn task_list_follows_column_then_task_position() {
        let list = doc().list(&ScopeKey::tasks("ws1")).unwrap();
        let ids: Vec<&str> = list.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t4"]);
    }

    #[test]
    fn tag_param_filters_tasks() {
        let list = doc()
            .list(&ScopeKey::tasks("ws1").with(TAG_PARAM, "bug"))
            .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "t2");
    }

    #[test]
    fn column_scope_requires_workspace() {
        let err = doc()
            .list(&ScopeKey::new(EntityKind::Column))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidScope(_)));
    }

    #[test]
    fn batch_with_unknown_entity_applies_nothing() {
        let mut doc = doc();
        let before = doc.clone();
        let batch = PositionBatch {
            kind: EntityKind::Task,
            scope: ScopeKey::tasks("ws1"),
            updates: vec![
                PositionUpdate {
                    id: "t1".to_string(),
                    position: 5,
                    container_id: Some("T1".to_string()),
                },
                PositionUpdate {
                    id: "ghost".to_string(),
                    position: 0,
                    container_id: Some("T1".to_string()),
                },
            ],
        };
        assert!(doc.apply_positions(&batch).is_err());
        assert_eq!(doc, before);
    }

    #[test]
    fn validate_rejects_task_in_unknown_column() {
        let mut doc = doc();
        doc.boards
            .get_mut("ws1")
            .unwrap()
            .tasks
            .push(Entity::task("t9", "nowhere", 0));
        assert!(matches!(doc.validate(), Err(Error::EntityNotFound(_))));
    }

    #[test]
    fn validate_rejects_duplicate_positions() {
        let mut clash = doc();
        clash.boards.get_mut("ws1").unwrap().tasks[1].position = 0;
        match clash.validate() {
            Err(Error::InvalidArgument(message)) => {
                assert!(message.contains("both at position 0 in column T1"), "{message}")
            }
            other => panic!("unexpected result: {other:?}"),
        }

        // Same position in different columns is fine.
        let mut spread = doc();
        spread.boards.get_mut("ws1").unwrap().tasks[0].position = 1;
        assert!(spread.validate().is_ok());
    }

    #[test]
    fn partial_renumbering_applies_nothing() {
        let mut doc = doc();
        let before = doc.clone();
        // Renumbers t2 alone, landing on t1's slot.
        let batch = PositionBatch {
            kind: EntityKind::Task,
            scope: ScopeKey::tasks("ws1").with(TAG_PARAM, "bug"),
            updates: vec![PositionUpdate {
                id: "t2".to_string(),
                position: 0,
                container_id: Some("T1".to_string()),
            }],
        };
        assert!(matches!(
            doc.apply_positions(&batch),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(doc, before);
    }

    #[test]
    fn file_backend_round_trips_document() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("board.json"));
        backend.save(&doc()).unwrap();
        assert_eq!(backend.load().unwrap(), doc());
    }
}
