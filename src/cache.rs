//! Ordered collection cache.
//!
//! Maps a [`ScopeKey`] to the ordered list of entities last read (or
//! optimistically written) for it. Overlapping scopes each own an
//! independent copy; nothing is deduplicated across keys. Coherence
//! between views comes from invalidating every touched key once a mutation
//! settles and refetching on the next read.
//!
//! The cache is created once at startup and shared through [`CacheStore`],
//! a cheap-to-clone handle. All access is synchronous and single-threaded;
//! no borrow of the store is held across an `.await`.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::debug;

use crate::backend::ListProvider;
use crate::entity::{ensure_unique, Entity, EntityKind};
use crate::error::Result;
use crate::scope::{ScopeKey, ScopePrefix};

#[derive(Debug, Clone)]
struct CacheEntry {
    entities: Vec<Entity>,
    stale: bool,
}

/// Proof that a read for `key` started at a given generation.
///
/// A read whose ticket has been superseded (by a cancellation or by a
/// newer read) is dropped when it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: ScopeKey,
    generation: u64,
}

/// Keyed store of ordered entity lists
#[derive(Debug, Default)]
pub struct OrderedCache {
    entries: HashMap<ScopeKey, CacheEntry>,
    generations: HashMap<ScopeKey, u64>,
    in_flight: HashSet<ScopeKey>,
}

impl OrderedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ScopeKey) -> Option<Vec<Entity>> {
        self.entries.get(key).map(|entry| entry.entities.clone())
    }

    /// Borrow the list for `key` without cloning it
    pub fn view(&self, key: &ScopeKey) -> Option<&[Entity]> {
        self.entries.get(key).map(|entry| entry.entities.as_slice())
    }

    /// Replace the list for `key`. The entry becomes fresh.
    pub fn set(&mut self, key: ScopeKey, entities: Vec<Entity>) -> Result<()> {
        ensure_unique(&entities, &key.to_string())?;
        self.entries.insert(
            key,
            CacheEntry {
                entities,
                stale: false,
            },
        );
        Ok(())
    }

    pub fn remove(&mut self, key: &ScopeKey) -> Option<Vec<Entity>> {
        self.entries.remove(key).map(|entry| entry.entities)
    }

    pub fn contains(&self, key: &ScopeKey) -> bool {
        self.entries.contains_key(key)
    }

    /// True when `key` is absent or has been invalidated
    pub fn is_stale(&self, key: &ScopeKey) -> bool {
        self.entries.get(key).map(|entry| entry.stale).unwrap_or(true)
    }

    /// Every cached key holding entities of `kind`, sorted
    pub fn keys_of(&self, kind: EntityKind) -> Vec<ScopeKey> {
        let mut keys: Vec<ScopeKey> = self
            .entries
            .keys()
            .filter(|key| key.kind() == kind)
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Cached keys of `kind` that hold an entity with `id`, sorted
    pub fn keys_containing(&self, kind: EntityKind, id: &str) -> Vec<ScopeKey> {
        let mut keys: Vec<ScopeKey> = self
            .entries
            .iter()
            .filter(|(key, entry)| {
                key.kind() == kind && entry.entities.iter().any(|entity| entity.id == id)
            })
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Apply `updater` to every entity of every `kind` list.
    ///
    /// `updater` returns `true` when it changed the entity. Returns the keys
    /// whose contents changed.
    pub fn patch_all<F>(&mut self, kind: EntityKind, mut updater: F) -> Vec<ScopeKey>
    where
        F: FnMut(&mut Entity) -> bool,
    {
        let mut changed = Vec::new();
        for (key, entry) in self.entries.iter_mut() {
            if key.kind() != kind {
                continue;
            }
            let mut touched = false;
            for entity in entry.entities.iter_mut() {
                touched |= updater(entity);
            }
            if touched {
                changed.push(key.clone());
            }
        }
        changed.sort();
        changed
    }

    /// Mark every key matching `prefix` stale. Returns the matched keys.
    pub fn invalidate(&mut self, prefix: &ScopePrefix) -> Vec<ScopeKey> {
        let mut matched = Vec::new();
        for (key, entry) in self.entries.iter_mut() {
            if prefix.matches(key) {
                entry.stale = true;
                matched.push(key.clone());
            }
        }
        matched.sort();
        matched
    }

    /// Mark exactly `keys` stale, leaving overlapping scopes alone.
    pub fn mark_stale(&mut self, keys: &[ScopeKey]) {
        for key in keys {
            if let Some(entry) = self.entries.get_mut(key) {
                entry.stale = true;
            }
        }
    }

    /// Put back a snapshotted value, including its absence.
    pub(crate) fn restore(&mut self, key: &ScopeKey, entities: Option<Vec<Entity>>) {
        match entities {
            Some(entities) => {
                self.entries.insert(
                    key.clone(),
                    CacheEntry {
                        entities,
                        stale: false,
                    },
                );
            }
            None => {
                self.entries.remove(key);
            }
        }
    }

    /// Start a read for `key`. Any older outstanding read is superseded.
    pub fn begin_fetch(&mut self, key: &ScopeKey) -> FetchTicket {
        let generation = self.generations.entry(key.clone()).or_insert(0);
        *generation += 1;
        self.in_flight.insert(key.clone());
        FetchTicket {
            key: key.clone(),
            generation: *generation,
        }
    }

    /// Land the result of a read. Returns `false` if the read was
    /// cancelled or superseded, in which case the cache is untouched.
    pub fn finish_fetch(&mut self, ticket: FetchTicket, entities: Vec<Entity>) -> Result<bool> {
        let current = self.generations.get(&ticket.key).copied().unwrap_or(0);
        if current != ticket.generation {
            debug!(scope = %ticket.key, "dropping superseded read");
            return Ok(false);
        }
        self.in_flight.remove(&ticket.key);
        self.set(ticket.key, entities)?;
        Ok(true)
    }

    pub fn is_fetching(&self, key: &ScopeKey) -> bool {
        self.in_flight.contains(key)
    }

    /// Cancel outstanding reads for `keys`. Returns the keys that had one.
    pub fn cancel_fetches(&mut self, keys: &[ScopeKey]) -> Vec<ScopeKey> {
        let mut cancelled = Vec::new();
        for key in keys {
            if self.in_flight.remove(key) {
                *self.generations.entry(key.clone()).or_insert(0) += 1;
                cancelled.push(key.clone());
            }
        }
        cancelled
    }
}

/// Shared handle to the process-wide [`OrderedCache`]
#[derive(Debug, Clone, Default)]
pub struct CacheStore {
    inner: Rc<RefCell<OrderedCache>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with shared access to the cache
    pub fn with<R>(&self, f: impl FnOnce(&OrderedCache) -> R) -> R {
        f(&self.inner.borrow())
    }

    /// Run `f` with exclusive access to the cache
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut OrderedCache) -> R) -> R {
        f(&mut self.inner.borrow_mut())
    }

    pub fn get(&self, key: &ScopeKey) -> Option<Vec<Entity>> {
        self.with(|cache| cache.get(key))
    }

    pub fn set(&self, key: ScopeKey, entities: Vec<Entity>) -> Result<()> {
        self.with_mut(|cache| cache.set(key, entities))
    }

    pub fn patch_all<F>(&self, kind: EntityKind, updater: F) -> Vec<ScopeKey>
    where
        F: FnMut(&mut Entity) -> bool,
    {
        self.with_mut(|cache| cache.patch_all(kind, updater))
    }

    pub fn invalidate(&self, prefix: &ScopePrefix) -> Vec<ScopeKey> {
        self.with_mut(|cache| cache.invalidate(prefix))
    }

    pub fn is_stale(&self, key: &ScopeKey) -> bool {
        self.with(|cache| cache.is_stale(key))
    }

    pub fn keys_of(&self, kind: EntityKind) -> Vec<ScopeKey> {
        self.with(|cache| cache.keys_of(kind))
    }

    /// Read `key`, fetching from `provider` when it is missing or stale.
    ///
    /// If an optimistic write cancels the read while it is in flight, the
    /// fetched data is discarded and the cached value wins.
    pub async fn read<P>(&self, key: &ScopeKey, provider: &P) -> Result<Vec<Entity>>
    where
        P: ListProvider + ?Sized,
    {
        if let Some(fresh) = self.with(|cache| {
            (!cache.is_stale(key)).then(|| cache.get(key)).flatten()
        }) {
            return Ok(fresh);
        }
        self.refresh(key, provider).await?;
        Ok(self.get(key).unwrap_or_default())
    }

    /// Refetch `key` unconditionally. Returns `false` if the result was
    /// dropped because the read was cancelled meanwhile.
    pub async fn refresh<P>(&self, key: &ScopeKey, provider: &P) -> Result<bool>
    where
        P: ListProvider + ?Sized,
    {
        let ticket = self.with_mut(|cache| cache.begin_fetch(key));
        let entities = provider.fetch(key).await?;
        let landed = self.with_mut(|cache| cache.finish_fetch(ticket, entities))?;
        debug!(scope = %key, landed, "refetched scope");
        Ok(landed)
    }

    /// Refetch every stale entry. Returns the keys that were refreshed.
    pub async fn refresh_stale<P>(&self, provider: &P) -> Result<Vec<ScopeKey>>
    where
        P: ListProvider + ?Sized,
    {
        let stale: Vec<ScopeKey> = self.with(|cache| {
            let mut keys: Vec<ScopeKey> = cache
                .entries
                .iter()
                .filter(|(_, entry)| entry.stale)
                .map(|(key, _)| key.clone())
                .collect();
            keys.sort();
            keys
        });

        let mut refreshed = Vec::with_capacity(stale.len());
        for key in stale {
            if self.refresh(&key, provider).await? {
                refreshed.push(key);
            }
        }
        Ok(refreshed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityEdit;
    use crate::scope::TAG_PARAM;

    fn tasks() -> Vec<Entity> {
        vec![
            Entity::task("t1", "c1", 0).with_tags(["bug"]),
            Entity::task("t2", "c1", 1),
        ]
    }

    #[test]
    fn set_replaces_and_get_clones() {
        let mut cache = OrderedCache::new();
        let key = ScopeKey::tasks("ws1");
        assert!(cache.get(&key).is_none());
        assert!(cache.is_stale(&key));

        cache.set(key.clone(), tasks()).unwrap();
        assert_eq!(cache.get(&key).unwrap().len(), 2);
        assert!(!cache.is_stale(&key));

        cache.set(key.clone(), vec![]).unwrap();
        assert!(cache.get(&key).unwrap().is_empty());
    }

    #[test]
    fn set_rejects_duplicate_ids() {
        let mut cache = OrderedCache::new();
        let list = vec![Entity::column("c1", 0), Entity::column("c1", 1)];
        assert!(cache.set(ScopeKey::columns("ws1"), list).is_err());
        assert!(!cache.contains(&ScopeKey::columns("ws1")));
    }

    #[test]
    fn patch_all_reaches_overlapping_views() {
        let mut cache = OrderedCache::new();
        let all = ScopeKey::tasks("ws1");
        let bugs = ScopeKey::tasks("ws1").with(TAG_PARAM, "bug");
        cache.set(all.clone(), tasks()).unwrap();
        cache.set(bugs.clone(), vec![tasks()[0].clone()]).unwrap();
        cache.set(ScopeKey::columns("ws1"), vec![Entity::column("c1", 0)]).unwrap();

        let edit = EntityEdit::AddTag("ui".to_string());
        let changed = cache.patch_all(EntityKind::Task, |entity| {
            entity.id == "t1" && edit.apply(entity)
        });

        assert_eq!(changed, vec![all.clone(), bugs.clone()]);
        assert!(cache.get(&all).unwrap()[0].has_tag("ui"));
        assert!(cache.get(&bugs).unwrap()[0].has_tag("ui"));
        assert!(!cache.get(&all).unwrap()[1].has_tag("ui"));
    }

    #[test]
    fn invalidate_marks_matching_entries_stale() {
        let mut cache = OrderedCache::new();
        cache.set(ScopeKey::tasks("ws1"), tasks()).unwrap();
        cache.set(ScopeKey::tasks("ws2"), vec![]).unwrap();
        cache.set(ScopeKey::columns("ws1"), vec![]).unwrap();

        let matched = cache.invalidate(&ScopePrefix::from(EntityKind::Task).with("workspace", "ws1"));
        assert_eq!(matched, vec![ScopeKey::tasks("ws1")]);
        assert!(cache.is_stale(&ScopeKey::tasks("ws1")));
        assert!(!cache.is_stale(&ScopeKey::tasks("ws2")));
        assert!(!cache.is_stale(&ScopeKey::columns("ws1")));
        // Stale entries still serve their last value.
        assert_eq!(cache.get(&ScopeKey::tasks("ws1")).unwrap().len(), 2);
    }

    #[test]
    fn cancelled_fetch_does_not_land() {
        let mut cache = OrderedCache::new();
        let key = ScopeKey::tasks("ws1");
        cache.set(key.clone(), tasks()).unwrap();

        let ticket = cache.begin_fetch(&key);
        assert!(cache.is_fetching(&key));
        assert_eq!(cache.cancel_fetches(&[key.clone()]), vec![key.clone()]);
        assert!(!cache.is_fetching(&key));

        let landed = cache.finish_fetch(ticket, vec![]).unwrap();
        assert!(!landed);
        assert_eq!(cache.get(&key).unwrap().len(), 2);
    }

    #[test]
    fn newer_fetch_supersedes_older() {
        let mut cache = OrderedCache::new();
        let key = ScopeKey::columns("ws1");
        let old = cache.begin_fetch(&key);
        let new = cache.begin_fetch(&key);

        assert!(cache
            .finish_fetch(new, vec![Entity::column("c2", 0)])
            .unwrap());
        assert!(!cache
            .finish_fetch(old, vec![Entity::column("c1", 0)])
            .unwrap());
        assert_eq!(cache.get(&key).unwrap()[0].id, "c2");
    }

    #[test]
    fn cancel_without_outstanding_read_is_a_no_op() {
        let mut cache = OrderedCache::new();
        assert!(cache.cancel_fetches(&[ScopeKey::workspaces()]).is_empty());
    }
}
