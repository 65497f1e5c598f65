//! Orderable entities shown in sortable lists.
//!
//! Every sortable list in a board holds entities of a single [`EntityKind`]:
//! workspaces in the sidebar, columns in a board, tasks across the columns
//! of a workspace. Tasks carry the id of the column that contains them;
//! columns and workspaces live under a single implicit root.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifier of an orderable entity
pub type EntityId = String;

/// Identifier of a container (the id of the parent entity)
pub type ContainerId = String;

/// Kind of entity placed in a sortable list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Workspace,
    Column,
    Task,
}

impl EntityKind {
    /// Kind of the container that holds entities of this kind, if any
    pub fn container_kind(&self) -> Option<EntityKind> {
        match self {
            EntityKind::Task => Some(EntityKind::Column),
            EntityKind::Column | EntityKind::Workspace => None,
        }
    }

    /// Plural name used in scope keys
    pub fn plural(&self) -> &'static str {
        match self {
            EntityKind::Workspace => "workspaces",
            EntityKind::Column => "columns",
            EntityKind::Task => "tasks",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Workspace => write!(f, "workspace"),
            EntityKind::Column => write!(f, "column"),
            EntityKind::Task => write!(f, "task"),
        }
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "workspace" | "workspaces" => Ok(EntityKind::Workspace),
            "column" | "columns" => Ok(EntityKind::Column),
            "task" | "tasks" => Ok(EntityKind::Task),
            _ => Err(Error::InvalidArgument(format!(
                "Invalid entity kind '{}'. Expected: workspace, column, task",
                s
            ))),
        }
    }
}

/// An item placed in a sortable list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<ContainerId>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Entity {
    pub fn new(id: impl Into<String>, kind: EntityKind, position: i64) -> Self {
        Self {
            id: id.into(),
            kind,
            position,
            container_id: None,
            title: String::new(),
            tags: Vec::new(),
        }
    }

    /// A task placed in `column` at `position`
    pub fn task(id: impl Into<String>, column: impl Into<String>, position: i64) -> Self {
        let mut entity = Self::new(id, EntityKind::Task, position);
        entity.container_id = Some(column.into());
        entity
    }

    pub fn column(id: impl Into<String>, position: i64) -> Self {
        Self::new(id, EntityKind::Column, position)
    }

    pub fn workspace(id: impl Into<String>, position: i64) -> Self {
        Self::new(id, EntityKind::Workspace, position)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// True when both entities sit in the same container (or both at the root)
    pub fn shares_container(&self, other: &Entity) -> bool {
        self.container_id == other.container_id
    }
}

/// A field-level edit applied optimistically to a single entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum EntityEdit {
    AddTag(String),
    RemoveTag(String),
    Rename(String),
}

impl EntityEdit {
    /// Apply the edit in place. Returns `true` if the entity changed.
    pub fn apply(&self, entity: &mut Entity) -> bool {
        match self {
            EntityEdit::AddTag(tag) => {
                if entity.has_tag(tag) {
                    return false;
                }
                entity.tags.push(tag.clone());
                true
            }
            EntityEdit::RemoveTag(tag) => {
                let before = entity.tags.len();
                entity.tags.retain(|t| t != tag);
                entity.tags.len() != before
            }
            EntityEdit::Rename(title) => {
                if entity.title == *title {
                    return false;
                }
                entity.title = title.clone();
                true
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            EntityEdit::AddTag(tag) => format!("add tag {tag}"),
            EntityEdit::RemoveTag(tag) => format!("remove tag {tag}"),
            EntityEdit::Rename(title) => format!("rename to {title}"),
        }
    }
}

/// Index of `id` in `list`
pub fn index_of(list: &[Entity], id: &str) -> Option<usize> {
    list.iter().position(|entity| entity.id == id)
}

/// Number of times `id` occurs in `list`
pub fn occurrences(list: &[Entity], id: &str) -> usize {
    list.iter().filter(|entity| entity.id == id).count()
}

/// Reject lists in which an id occurs more than once.
pub fn ensure_unique(list: &[Entity], scope: &str) -> Result<()> {
    let mut seen = HashSet::with_capacity(list.len());
    for entity in list {
        if !seen.insert(entity.id.as_str()) {
            return Err(Error::DuplicateEntity {
                id: entity.id.clone(),
                scope: scope.to_string(),
            });
        }
    }
    Ok(())
}

/// Ids of `list` in order
pub fn ids(list: &[Entity]) -> Vec<&str> {
    list.iter().map(|entity| entity.id.as_str()).collect()
}
