//! Cache synchronizer: optimistic writes with snapshot and rollback.
//!
//! Every mutation runs the same protocol:
//! 1. cancel in-flight reads of every scope about to be touched
//! 2. snapshot those scopes
//! 3. apply the change to the cache synchronously
//! 4. await the persistence call
//! 5. on failure restore the snapshot verbatim and emit one notice
//! 6. on settle, success or failure, mark the touched scopes stale
//!
//! [`OptimisticMutation`] owns the snapshot. Dropping it unsettled (an
//! early return, a panic while awaiting) restores and invalidates just like
//! a failed settle, so the cache never keeps a half-applied guess.

use std::future::Future;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::{EntityEndpoint, PositionEndpoint};
use crate::cache::{CacheStore, OrderedCache};
use crate::entity::{Entity, EntityEdit, EntityKind};
use crate::error::Result;
use crate::notify::{Notice, Notifier};
use crate::reconcile::{apply_batch, PositionBatch};
use crate::scope::ScopeKey;

/// Previous values of every scope touched by one mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSnapshot {
    entries: Vec<(ScopeKey, Option<Vec<Entity>>)>,
}

impl CacheSnapshot {
    pub fn capture(cache: &OrderedCache, keys: &[ScopeKey]) -> Self {
        Self {
            entries: keys.iter().map(|key| (key.clone(), cache.get(key))).collect(),
        }
    }

    /// Value of `key` at capture time (`None` if it was absent)
    pub fn value(&self, key: &ScopeKey) -> Option<&[Entity]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, value)| value.as_deref())
    }

    fn restore(self, cache: &mut OrderedCache) {
        for (key, value) in self.entries {
            cache.restore(&key, value);
        }
    }
}

/// How a mutation settled
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MutationOutcome {
    Applied {
        id: Uuid,
        touched: Vec<ScopeKey>,
    },
    RolledBack {
        id: Uuid,
        touched: Vec<ScopeKey>,
        reason: String,
    },
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied { .. })
    }

    pub fn touched(&self) -> &[ScopeKey] {
        match self {
            MutationOutcome::Applied { touched, .. } | MutationOutcome::RolledBack { touched, .. } => {
                touched
            }
        }
    }
}

/// An optimistic change that has been applied but not yet settled
#[derive(Debug)]
pub struct OptimisticMutation {
    id: Uuid,
    label: String,
    store: CacheStore,
    touched: Vec<ScopeKey>,
    snapshot: Option<CacheSnapshot>,
}

impl OptimisticMutation {
    /// Cancel reads, snapshot `keys`, and apply `mutate`.
    ///
    /// If `mutate` fails the cache is restored before the error returns.
    pub fn begin<F>(store: &CacheStore, label: impl Into<String>, keys: Vec<ScopeKey>, mutate: F) -> Result<Self>
    where
        F: FnOnce(&mut OrderedCache) -> Result<()>,
    {
        let id = Uuid::new_v4();
        let label = label.into();
        let mut touched = keys;
        touched.sort();
        touched.dedup();

        let snapshot = store.with_mut(|cache| {
            let cancelled = cache.cancel_fetches(&touched);
            if !cancelled.is_empty() {
                debug!(%id, cancelled = cancelled.len(), "cancelled in-flight reads");
            }
            let snapshot = CacheSnapshot::capture(cache, &touched);
            match mutate(cache) {
                Ok(()) => Ok(snapshot),
                Err(err) => {
                    snapshot.restore(cache);
                    Err(err)
                }
            }
        })?;

        debug!(%id, label = %label, scopes = touched.len(), "optimistic write applied");
        Ok(Self {
            id,
            label,
            store: store.clone(),
            touched,
            snapshot: Some(snapshot),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn touched(&self) -> &[ScopeKey] {
        &self.touched
    }

    pub fn snapshot(&self) -> Option<&CacheSnapshot> {
        self.snapshot.as_ref()
    }

    /// Settle with the persistence result.
    pub fn settle<N>(mut self, result: Result<()>, notifier: &N) -> MutationOutcome
    where
        N: Notifier + ?Sized,
    {
        let snapshot = self.snapshot.take();
        let touched = std::mem::take(&mut self.touched);
        let outcome = match result {
            Ok(()) => {
                debug!(id = %self.id, label = %self.label, "mutation persisted");
                MutationOutcome::Applied {
                    id: self.id,
                    touched: touched.clone(),
                }
            }
            Err(err) => {
                warn!(id = %self.id, label = %self.label, error = %err, "rolling back optimistic write");
                if let Some(snapshot) = snapshot {
                    self.store.with_mut(|cache| snapshot.restore(cache));
                }
                notifier.notify(
                    Notice::error(format!("could not {}: {err}", self.label)).for_mutation(self.id),
                );
                MutationOutcome::RolledBack {
                    id: self.id,
                    touched: touched.clone(),
                    reason: err.to_string(),
                }
            }
        };
        self.store.with_mut(|cache| cache.mark_stale(&touched));
        outcome
    }
}

impl Drop for OptimisticMutation {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            warn!(id = %self.id, label = %self.label, "unsettled mutation dropped; restoring snapshot");
            let touched = std::mem::take(&mut self.touched);
            self.store.with_mut(|cache| {
                snapshot.restore(cache);
                cache.mark_stale(&touched);
            });
        }
    }
}

/// Runs optimistic mutations against a shared cache
#[derive(Clone)]
pub struct Synchronizer {
    store: CacheStore,
    notifier: Rc<dyn Notifier>,
}

impl Synchronizer {
    pub fn new(store: CacheStore, notifier: Rc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn notifier(&self) -> &Rc<dyn Notifier> {
        &self.notifier
    }

    /// Apply `mutate` to `keys`, then settle with the result of `persist`.
    ///
    /// Returns `Err` only when `mutate` itself fails; persistence failures
    /// come back as [`MutationOutcome::RolledBack`].
    pub async fn run<F, Fut>(
        &self,
        label: &str,
        keys: Vec<ScopeKey>,
        mutate: F,
        persist: Fut,
    ) -> Result<MutationOutcome>
    where
        F: FnOnce(&mut OrderedCache) -> Result<()>,
        Fut: Future<Output = Result<()>>,
    {
        let mutation = OptimisticMutation::begin(&self.store, label, keys, mutate)?;
        let result = persist.await;
        Ok(mutation.settle(result, self.notifier.as_ref()))
    }

    /// Commit a position batch.
    ///
    /// `scope` receives `staged` with the batch applied; every other cached
    /// scope of the same kind holding one of the moved entities is patched
    /// too, so overlapping views agree until the refetch.
    pub async fn commit_positions<E>(
        &self,
        scope: &ScopeKey,
        staged: &[Entity],
        batch: &PositionBatch,
        endpoint: &E,
    ) -> Result<MutationOutcome>
    where
        E: PositionEndpoint + ?Sized,
    {
        let mut keys = vec![scope.clone()];
        self.store.with(|cache| {
            for update in &batch.updates {
                keys.extend(cache.keys_containing(batch.kind, &update.id));
            }
        });

        let committed = apply_batch(staged, batch);
        let session_scope = scope.clone();
        let mutate = move |cache: &mut OrderedCache| {
            let others: Vec<ScopeKey> = cache
                .keys_of(batch.kind)
                .into_iter()
                .filter(|key| *key != session_scope)
                .filter(|key| {
                    cache
                        .view(key)
                        .map(|list| list.iter().any(|entity| batch.get(&entity.id).is_some()))
                        .unwrap_or(false)
                })
                .collect();
            for key in others {
                if let Some(current) = cache.get(&key) {
                    cache.set(key, apply_batch(&current, batch))?;
                }
            }
            cache.set(session_scope, committed)
        };

        self.run("save order", keys, mutate, endpoint.update_positions(batch))
            .await
    }

    /// Apply a field-level edit to every cached copy of one entity.
    pub async fn update_entity<E>(
        &self,
        kind: EntityKind,
        id: &str,
        edit: &EntityEdit,
        endpoint: &E,
    ) -> Result<MutationOutcome>
    where
        E: EntityEndpoint + ?Sized,
    {
        let keys = self.store.with(|cache| cache.keys_containing(kind, id));
        let mutate = |cache: &mut OrderedCache| {
            cache.patch_all(kind, |entity| entity.id == id && edit.apply(entity));
            Ok(())
        };
        let label = format!("{} on {kind} {id}", edit.describe());
        self.run(&label, keys, mutate, endpoint.update_entity(kind, id, edit))
            .await
    }
}
