//! At-most-once memoization of subgraph computations.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;

/// Identifies one memoized computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CacheKey {
    /// Normalized snapshot label.
    pub snapshot: String,
    /// Root node id.
    pub root_id: String,
    /// Depth bound.
    pub max_depth: usize,
}

impl CacheKey {
    /// Builds a key from borrowed parts.
    pub fn new(snapshot: impl Into<String>, root_id: impl Into<String>, max_depth: usize) -> Self {
        Self {
            snapshot: snapshot.into(),
            root_id: root_id.into(),
            max_depth,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.snapshot, self.root_id, self.max_depth)
    }
}

/// How a [`CacheEntry`] was obtained by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOrigin {
    /// This caller ran the computation.
    Computed,
    /// The entry was already complete.
    Hit,
    /// Another caller was computing it; this one waited for the result.
    Shared,
}

/// A completed result for one key.
#[derive(Debug)]
pub struct CacheEntry<V> {
    /// Key the entry belongs to.
    pub key: CacheKey,
    /// The computed value, shared with every other holder.
    pub value: Arc<V>,
    /// How this caller obtained it.
    pub origin: EntryOrigin,
}

impl<V> Clone for CacheEntry<V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            value: Arc::clone(&self.value),
            origin: self.origin,
        }
    }
}

/// Something holding data derived from ingested snapshots.
pub trait Invalidate: Send + Sync {
    /// Drops everything derived from the previous data.
    fn invalidate_all(&self);
}

enum SlotState<V> {
    Pending,
    Complete(Arc<V>),
    /// The computing caller failed or panicked; waiters retry.
    Abandoned,
}

struct Slot<V> {
    state: Mutex<SlotState<V>>,
    ready: Condvar,
}

impl<V> Slot<V> {
    fn pending() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SlotState::Pending),
            ready: Condvar::new(),
        })
    }

    fn settle(&self, state: SlotState<V>) {
        *self.state.lock() = state;
        self.ready.notify_all();
    }
}

/// Counters for a [`ResultCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from a complete entry.
    pub hits: u64,
    /// Lookups that found no complete entry (computed or waited).
    pub misses: u64,
    /// Compute functions run to success.
    pub computations: u64,
    /// Full flushes.
    pub invalidations: u64,
}

impl CacheStats {
    /// Fraction of lookups served without computing or waiting.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
    invalidations: AtomicU64,
}

/// Concurrent single-flight memo keyed by [`CacheKey`].
///
/// The map lock is held only to find or insert a slot. Computation happens
/// outside it, so distinct keys never block each other; callers of the same
/// key park on that key's condvar until the value is complete.
pub struct ResultCache<V> {
    slots: Mutex<HashMap<CacheKey, Arc<Slot<V>>>>,
    counters: Counters,
}

impl<V> Default for ResultCache<V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }
}

impl<V> fmt::Debug for ResultCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("entries", &self.slots.lock().len())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Marks the slot abandoned and unpublishes it unless the leader completed.
struct LeaderGuard<'a, V> {
    cache: &'a ResultCache<V>,
    key: &'a CacheKey,
    slot: &'a Arc<Slot<V>>,
    completed: bool,
}

impl<V> Drop for LeaderGuard<'_, V> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        {
            let mut slots = self.cache.slots.lock();
            if slots
                .get(self.key)
                .is_some_and(|current| Arc::ptr_eq(current, self.slot))
            {
                slots.remove(self.key);
            }
        }
        self.slot.settle(SlotState::Abandoned);
    }
}

impl<V> ResultCache<V> {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `key`, running `compute` only if no complete or
    /// in-flight entry exists.
    ///
    /// Concurrent callers of the same key wait for the single computation and
    /// share its value. A failed computation is not cached: its error goes to
    /// the caller that ran it and waiting callers retry.
    pub fn get_or_compute<F>(&self, key: &CacheKey, compute: F) -> Result<CacheEntry<V>>
    where
        F: FnOnce() -> Result<V>,
    {
        let mut waited = false;
        loop {
            let slot = {
                let mut slots = self.slots.lock();
                match slots.get(key) {
                    Some(slot) => Arc::clone(slot),
                    None => {
                        let slot = Slot::pending();
                        slots.insert(key.clone(), Arc::clone(&slot));
                        drop(slots);
                        if !waited {
                            self.counters.misses.fetch_add(1, Ordering::Relaxed);
                        }
                        return self.lead(key, &slot, compute);
                    }
                }
            };

            let mut state = slot.state.lock();
            if let SlotState::Complete(value) = &*state {
                if !waited {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                }
                debug!(%key, "result cache hit");
                return Ok(CacheEntry {
                    key: key.clone(),
                    value: Arc::clone(value),
                    origin: if waited { EntryOrigin::Shared } else { EntryOrigin::Hit },
                });
            }
            if !waited {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                waited = true;
            }
            debug!(%key, "waiting for in-flight computation");
            while matches!(*state, SlotState::Pending) {
                slot.ready.wait(&mut state);
            }
            if let SlotState::Complete(value) = &*state {
                return Ok(CacheEntry {
                    key: key.clone(),
                    value: Arc::clone(value),
                    origin: EntryOrigin::Shared,
                });
            }
            // Abandoned: loop and either find a newer slot or lead ourselves.
        }
    }

    fn lead<F>(&self, key: &CacheKey, slot: &Arc<Slot<V>>, compute: F) -> Result<CacheEntry<V>>
    where
        F: FnOnce() -> Result<V>,
    {
        let mut guard = LeaderGuard {
            cache: self,
            key,
            slot,
            completed: false,
        };
        debug!(%key, "computing result");
        let value = Arc::new(compute()?);
        slot.settle(SlotState::Complete(Arc::clone(&value)));
        guard.completed = true;
        self.counters.computations.fetch_add(1, Ordering::Relaxed);
        Ok(CacheEntry {
            key: key.clone(),
            value,
            origin: EntryOrigin::Computed,
        })
    }

    /// The complete value for `key`, without computing.
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<V>> {
        let slot = self.slots.lock().get(key).cloned()?;
        let state = slot.state.lock();
        match &*state {
            SlotState::Complete(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// Number of published slots, complete or in flight.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// True when no slot is published.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry.
    ///
    /// Computations already in flight still finish and hand their value to
    /// the callers waiting on them, but the value is not visible to later
    /// lookups.
    pub fn clear(&self) {
        let dropped = {
            let mut slots = self.slots.lock();
            let dropped = slots.len();
            slots.clear();
            dropped
        };
        self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
        info!(dropped, "result cache invalidated");
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            computations: self.counters.computations.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
        }
    }
}

impl<V: Send + Sync> Invalidate for ResultCache<V> {
    fn invalidate_all(&self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn second_lookup_is_a_hit() {
        let cache = ResultCache::new();
        let key = CacheKey::new("s", "A", 2);
        let first = cache.get_or_compute(&key, || Ok(42)).unwrap();
        assert_eq!(first.origin, EntryOrigin::Computed);
        let second = cache
            .get_or_compute(&key, || -> Result<i32> { panic!("recomputed") })
            .unwrap();
        assert_eq!(second.origin, EntryOrigin::Hit);
        assert!(Arc::ptr_eq(&first.value, &second.value));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().computations, 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache: ResultCache<i32> = ResultCache::new();
        let key = CacheKey::new("s", "missing", 1);
        let err = cache
            .get_or_compute(&key, || Err(GraphError::node_not_found("missing")))
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(cache.is_empty());
        let calls = AtomicUsize::new(0);
        cache
            .get_or_compute(&key, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_forces_recomputation() {
        let cache = ResultCache::new();
        let key = CacheKey::new("s", "A", 2);
        cache.get_or_compute(&key, || Ok("old")).unwrap();
        cache.invalidate_all();
        assert!(cache.peek(&key).is_none());
        let entry = cache.get_or_compute(&key, || Ok("new")).unwrap();
        assert_eq!(*entry.value, "new");
        assert_eq!(entry.origin, EntryOrigin::Computed);
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[test]
    fn panicking_leader_releases_the_key() {
        let cache: Arc<ResultCache<u8>> = Arc::new(ResultCache::new());
        let key = CacheKey::new("s", "A", 0);
        let worker = {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            std::thread::spawn(move || {
                let _ = cache.get_or_compute(&key, || -> Result<u8> { panic!("boom") });
            })
        };
        assert!(worker.join().is_err());
        assert!(cache.is_empty());
        assert_eq!(*cache.get_or_compute(&key, || Ok(7)).unwrap().value, 7);
    }
}
