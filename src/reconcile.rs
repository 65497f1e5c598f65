//! Position reconciler.
//!
//! Turns the final staged order of a drag gesture into integer positions:
//! each entity gets its zero-based index among the entities that share its
//! container. Every commit re-indexes the whole scope, so entities that did
//! not move are rewritten too.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cache::OrderedCache;
use crate::entity::{ContainerId, Entity, EntityId, EntityKind};
use crate::error::{Error, Result};
use crate::scope::ScopeKey;

/// New position (and container, for contained kinds) of one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub id: EntityId,
    pub position: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<ContainerId>,
}

/// One request to the batch position endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionBatch {
    pub kind: EntityKind,
    pub scope: ScopeKey,
    pub updates: Vec<PositionUpdate>,
}

impl PositionBatch {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&PositionUpdate> {
        self.updates.iter().find(|update| update.id == id)
    }

    /// Updates grouped by container, containers in order of first appearance
    pub fn by_container(&self) -> Vec<(Option<ContainerId>, Vec<&PositionUpdate>)> {
        let mut groups: Vec<(Option<ContainerId>, Vec<&PositionUpdate>)> = Vec::new();
        for update in &self.updates {
            match groups
                .iter_mut()
                .find(|(container, _)| *container == update.container_id)
            {
                Some((_, members)) => members.push(update),
                None => groups.push((update.container_id.clone(), vec![update])),
            }
        }
        groups
    }
}

/// Zero-based positions per container for `staged`, in staged order.
pub fn reindex(staged: &[Entity]) -> Vec<PositionUpdate> {
    let mut next: HashMap<Option<&str>, i64> = HashMap::new();
    staged
        .iter()
        .map(|entity| {
            let slot = next.entry(entity.container_id.as_deref()).or_insert(0);
            let position = *slot;
            *slot += 1;
            PositionUpdate {
                id: entity.id.clone(),
                position,
                container_id: entity.container_id.clone(),
            }
        })
        .collect()
}

/// Pick the scope that owns a batch of `kind` updates.
///
/// Prefers `preferred` when the cache holds a non-empty list for it,
/// otherwise the first populated key of the same kind. Fails when the
/// cache holds no populated list of that kind at all.
pub fn resolve_scope(cache: &OrderedCache, kind: EntityKind, preferred: &ScopeKey) -> Result<ScopeKey> {
    let populated = |key: &ScopeKey| cache.view(key).map(|list| !list.is_empty()).unwrap_or(false);

    if preferred.kind() == kind && populated(preferred) {
        return Ok(preferred.clone());
    }
    cache
        .keys_of(kind)
        .into_iter()
        .find(|key| populated(key))
        .ok_or(Error::ScopeUnresolved { kind })
}

/// Build the batch committing `staged` for `scope`.
pub fn plan(cache: &OrderedCache, scope: &ScopeKey, staged: &[Entity]) -> Result<PositionBatch> {
    let kind = staged.first().map(|entity| entity.kind).unwrap_or(scope.kind());
    if let Some(stray) = staged.iter().find(|entity| entity.kind != kind) {
        return Err(Error::InvalidArgument(format!(
            "{} {} cannot be ordered alongside {kind} entities",
            stray.kind, stray.id
        )));
    }
    let scope = resolve_scope(cache, kind, scope)?;
    Ok(PositionBatch {
        kind,
        scope,
        updates: reindex(staged),
    })
}

/// Apply `batch` to `list`: rewrite positions and containers of the
/// entities it names, then order by container (in batch order) and
/// position. Entities outside the batch keep their values.
pub fn apply_batch(list: &[Entity], batch: &PositionBatch) -> Vec<Entity> {
    let mut container_rank: HashMap<Option<ContainerId>, usize> = HashMap::new();
    for update in &batch.updates {
        let next = container_rank.len();
        container_rank
            .entry(update.container_id.clone())
            .or_insert(next);
    }

    let mut out: Vec<Entity> = list
        .iter()
        .map(|entity| {
            let mut entity = entity.clone();
            if let Some(update) = batch.get(&entity.id) {
                entity.position = update.position;
                if update.container_id.is_some() {
                    entity.container_id = update.container_id.clone();
                }
            }
            entity
        })
        .collect();

    out.sort_by_key(|entity| {
        let rank = container_rank
            .get(&entity.container_id)
            .copied()
            .unwrap_or(usize::MAX);
        (rank, entity.position)
    });
    out
}

/// Split `list` into per-container runs, containers in first-seen order
pub fn group_by_container(list: &[Entity]) -> Vec<(Option<ContainerId>, Vec<Entity>)> {
    let mut groups: Vec<(Option<ContainerId>, Vec<Entity>)> = Vec::new();
    for entity in list {
        match groups
            .iter_mut()
            .find(|(container, _)| *container == entity.container_id)
        {
            Some((_, members)) => members.push(entity.clone()),
            None => groups.push((entity.container_id.clone(), vec![entity.clone()])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ids;

    fn staged() -> Vec<Entity> {
        vec![
            Entity::task("t2", "T1", 1),
            Entity::task("t3", "T1", 2),
            Entity::task("t4", "T2", 0),
            Entity::task("t1", "T2", 0),
        ]
    }

    #[test]
    fn reindex_counts_per_container() {
        let updates = reindex(&staged());
        let pairs: Vec<(&str, i64, Option<&str>)> = updates
            .iter()
            .map(|u| (u.id.as_str(), u.position, u.container_id.as_deref()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("t2", 0, Some("T1")),
                ("t3", 1, Some("T1")),
                ("t4", 0, Some("T2")),
                ("t1", 1, Some("T2")),
            ]
        );
    }

    #[test]
    fn reindex_root_entities_uses_list_index() {
        let columns = vec![
            Entity::column("c3", 7),
            Entity::column("c1", 0),
            Entity::column("c2", 3),
        ];
        let positions: Vec<i64> = reindex(&columns).iter().map(|u| u.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert!(reindex(&columns).iter().all(|u| u.container_id.is_none()));
    }

    #[test]
    fn plan_fails_without_populated_scope() {
        let cache = OrderedCache::new();
        let err = plan(&cache, &ScopeKey::tasks("ws1"), &staged()).unwrap_err();
        assert!(matches!(err, Error::ScopeUnresolved { kind: EntityKind::Task }));
    }

    #[test]
    fn plan_falls_back_to_another_populated_scope() {
        let mut cache = OrderedCache::new();
        cache.set(ScopeKey::tasks("ws1"), vec![]).unwrap();
        cache
            .set(ScopeKey::tasks("ws2"), vec![Entity::task("x", "c", 0)])
            .unwrap();
        let batch = plan(&cache, &ScopeKey::tasks("ws1"), &staged()).unwrap();
        assert_eq!(batch.scope, ScopeKey::tasks("ws2"));
    }

    #[test]
    fn plan_is_idempotent() {
        let mut cache = OrderedCache::new();
        cache.set(ScopeKey::tasks("ws1"), staged()).unwrap();
        let first = plan(&cache, &ScopeKey::tasks("ws1"), &staged()).unwrap();
        let second = plan(&cache, &ScopeKey::tasks("ws1"), &staged()).unwrap();
        assert_eq!(first, second);

        let applied = apply_batch(&staged(), &first);
        assert_eq!(apply_batch(&applied, &first), applied);
    }

    #[test]
    fn plan_rejects_mixed_kinds() {
        let mut cache = OrderedCache::new();
        cache.set(ScopeKey::tasks("ws1"), staged()).unwrap();
        let mut mixed = staged();
        mixed.push(Entity::column("c9", 0));
        assert!(plan(&cache, &ScopeKey::tasks("ws1"), &mixed).is_err());
    }

    #[test]
    fn apply_batch_reorders_filtered_views() {
        let batch = PositionBatch {
            kind: EntityKind::Task,
            scope: ScopeKey::tasks("ws1"),
            updates: reindex(&staged()),
        };
        // A filtered view that still shows t1 in its old column.
        let view = vec![Entity::task("t1", "T1", 0), Entity::task("t3", "T1", 2)];
        let patched = apply_batch(&view, &batch);
        assert_eq!(ids(&patched), vec!["t3", "t1"]);
        assert_eq!(patched[1].container_id.as_deref(), Some("T2"));
        assert_eq!(patched[1].position, 1);
    }

    #[test]
    fn groups_follow_first_appearance() {
        let groups = group_by_container(&staged());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0.as_deref(), Some("T1"));
        assert_eq!(ids(&groups[1].1), vec!["t4", "t1"]);

        let batch = PositionBatch {
            kind: EntityKind::Task,
            scope: ScopeKey::tasks("ws1"),
            updates: reindex(&staged()),
        };
        let by_container = batch.by_container();
        assert_eq!(by_container[1].1.len(), 2);
    }
}
