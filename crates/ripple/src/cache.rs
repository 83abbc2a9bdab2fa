//! Bounded cache for expensive derived results.
//!
//! Holds generated explanations, architecture summaries and impact results.
//! Entries are keyed by a structured [`CacheKey`] so values never leak across
//! repositories or commits.
//!
//! # Locking
//!
//! One mutex guards the entries, their insertion order and the current
//! repository. It is held for bookkeeping only: callers compute values
//! (graph traversal, explanation calls) before `insert`, never inside it.
//! Eviction runs in the same critical section as the insertion that
//! triggered it, so no thread ever observes more than `capacity` entries.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::error::{Error, Result};
use crate::impact::ImpactResult;
use crate::types::RepoId;

/// What a cached value is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// Natural-language explanation of an impact result
    ImpactExplanation,
    /// Architecture summary of a repository state
    ArchitectureSummary,
    /// Computed impact result
    Impact,
}

/// Structured cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// What the value is for
    pub purpose: Purpose,
    /// Repository the value belongs to
    pub repo_id: RepoId,
    /// Commit hash or file path the value describes
    pub scope: String,
    /// Further discriminator, e.g. the change type
    pub variant: String,
}

impl CacheKey {
    /// Build a key.
    #[must_use]
    pub fn new(
        purpose: Purpose,
        repo_id: RepoId,
        scope: impl Into<String>,
        variant: impl Into<String>,
    ) -> Self {
        Self {
            purpose,
            repo_id,
            scope: scope.into(),
            variant: variant.into(),
        }
    }
}

/// A cached value.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    /// Generated text
    Text(String),
    /// Impact result
    Impact(Arc<ImpactResult>),
}

struct Entry {
    value: CachedValue,
    /// Blast-radius total when the value was computed
    total_affected: Option<usize>,
}

#[derive(Default)]
struct State {
    entries: HashMap<CacheKey, Entry>,
    /// Insertion order for FIFO eviction
    order: VecDeque<CacheKey>,
    current_repo: Option<RepoId>,
}

impl State {
    fn remove(&mut self, key: &CacheKey) -> bool {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
            true
        } else {
            false
        }
    }

    fn remove_repo(&mut self, repo_id: &RepoId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| &key.repo_id != repo_id);
        self.order.retain(|key| &key.repo_id != repo_id);
        before - self.entries.len()
    }
}

/// Size-bounded, thread-safe result cache with FIFO eviction.
pub struct ResultCache {
    capacity: usize,
    state: Mutex<State>,
}

#[allow(clippy::missing_errors_doc)]
impl ResultCache {
    /// Create a cache holding at most `capacity` entries (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(State::default()),
        }
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| Error::Internal(format!("result cache lock poisoned: {e}")))
    }

    /// Look up a value.
    pub fn get(&self, key: &CacheKey) -> Result<Option<CachedValue>> {
        Ok(self.lock()?.entries.get(key).map(|e| e.value.clone()))
    }

    /// Look up a value computed for a blast radius of `current_total` files.
    ///
    /// An entry recorded with a different total is stale: it is dropped and
    /// `None` is returned.
    pub fn get_fresh(&self, key: &CacheKey, current_total: usize) -> Result<Option<CachedValue>> {
        let mut state = self.lock()?;
        let stale = match state.entries.get(key) {
            None => return Ok(None),
            Some(entry) => entry
                .total_affected
                .is_some_and(|recorded| recorded != current_total),
        };
        if stale {
            state.remove(key);
            debug!(scope = %key.scope, current_total, "dropped stale cache entry");
            return Ok(None);
        }
        Ok(state.entries.get(key).map(|e| e.value.clone()))
    }

    /// Insert or replace a value, evicting the oldest entries over capacity.
    ///
    /// `total_affected` records the blast-radius total the value was computed
    /// for, enabling [`get_fresh`](Self::get_fresh).
    pub fn insert(
        &self,
        key: CacheKey,
        value: CachedValue,
        total_affected: Option<usize>,
    ) -> Result<()> {
        let mut state = self.lock()?;
        state.remove(&key);
        state.order.push_back(key.clone());
        state.entries.insert(
            key,
            Entry {
                value,
                total_affected,
            },
        );
        while state.entries.len() > self.capacity {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            state.entries.remove(&oldest);
            debug!(purpose = ?oldest.purpose, scope = %oldest.scope, "evicted cache entry");
        }
        Ok(())
    }

    /// Make `repo_id` the current repository.
    ///
    /// Switching away from another repository clears every entry of that
    /// repository. Returns the number of entries removed.
    pub fn set_current_repo(&self, repo_id: &RepoId) -> Result<usize> {
        let mut state = self.lock()?;
        let removed = match state.current_repo.take() {
            Some(previous) if &previous != repo_id => state.remove_repo(&previous),
            _ => 0,
        };
        state.current_repo = Some(repo_id.clone());
        if removed > 0 {
            debug!(repo_id = %repo_id, removed, "cleared cache entries of previous repository");
        }
        Ok(removed)
    }

    /// Repository most recently made current.
    pub fn current_repo(&self) -> Result<Option<RepoId>> {
        Ok(self.lock()?.current_repo.clone())
    }

    /// Drop every entry of a repository.
    pub fn invalidate_repo(&self, repo_id: &RepoId) -> Result<usize> {
        Ok(self.lock()?.remove_repo(repo_id))
    }

    /// Drop every entry of a repository with the given purpose.
    pub fn invalidate_purpose(&self, repo_id: &RepoId, purpose: Purpose) -> Result<usize> {
        let mut state = self.lock()?;
        let before = state.entries.len();
        state
            .entries
            .retain(|key, _| !(&key.repo_id == repo_id && key.purpose == purpose));
        state
            .order
            .retain(|key| !(&key.repo_id == repo_id && key.purpose == purpose));
        Ok(before - state.entries.len())
    }

    /// Drop one entry.
    pub fn invalidate(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.lock()?.remove(key))
    }

    /// Number of entries.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.entries.len())
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.entries.is_empty())
    }
}
