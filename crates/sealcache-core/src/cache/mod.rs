//! Bounded LRU cache of endpoint keys.
//!
//! Two structures under one capacity bound: a [`KeyIndex`] for O(1) lookup by
//! id and a [`RecencyList`] for O(1) recency updates and eviction.
//!
//! # Invariants
//!
//! - Every record in the list is indexed under its id, and every indexed slot
//!   holds a record with that id
//! - `len() <= capacity()` after every operation
//! - A failing loader leaves the cache exactly as it was
//!
//! Eviction is synchronous and only happens when an insertion would exceed
//! the capacity.

mod index;
mod list;
mod shared;

use sealcache_crypto::KeyMaterial;
use thiserror::Error;
use tracing::debug;

use self::{
    index::KeyIndex,
    list::{RecencyList, Slot},
};
pub use self::{list::KeyRecord, shared::SharedKeyCache};
use crate::endpoint::EndpointId;

/// Errors from cache operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Capacity of zero requested
    #[error("cache capacity must be at least 1")]
    InvalidCapacity,

    /// Index and list disagree. Indicates a bug, never expected in normal
    /// operation.
    #[error("cache invariant violated: {0}")]
    Consistency(String),

    /// A thread panicked while holding the shared cache lock
    #[error("cache lock poisoned")]
    Poisoned,
}

/// Whether a lookup was served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOutcome {
    /// Key was resident
    Hit,
    /// Key was fetched through the loader and inserted
    Miss,
}

/// Running counters for a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that inserted a freshly loaded key
    pub misses: u64,
    /// Records removed to make room
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups that were hits, or `None` before any lookup.
    pub fn hit_ratio(&self) -> Option<f64> {
        let total = self.hits + self.misses;
        (total > 0).then(|| self.hits as f64 / total as f64)
    }
}

/// Bounded LRU key cache.
///
/// Single-owner; wrap in [`SharedKeyCache`] to share across threads.
#[derive(Debug)]
pub struct KeyCache {
    index: KeyIndex,
    list: RecencyList,
    capacity: usize,
    stats: CacheStats,
}

impl KeyCache {
    /// Create an empty cache holding at most `capacity` keys.
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        if capacity == 0 {
            return Err(CacheError::InvalidCapacity);
        }

        Ok(Self {
            index: KeyIndex::with_capacity(capacity),
            list: RecencyList::with_capacity(capacity),
            capacity,
            stats: CacheStats::default(),
        })
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// True if no keys are cached.
    pub fn is_empty(&self) -> bool {
        self.list.len() == 0
    }

    /// Maximum number of cached keys.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Hit/miss/eviction counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// True if `id` is cached. Does not affect recency.
    pub fn contains(&self, id: &EndpointId) -> bool {
        self.index.get(id).is_some()
    }

    /// Look up `id`, loading it on a miss.
    ///
    /// On a hit the record is promoted to most recently used and returned
    /// without allocating. On a miss `loader` is called first; only if it
    /// succeeds is the least recently used record evicted (when full) and the
    /// new record inserted. A loader error is returned with the cache
    /// untouched.
    pub fn lookup_or_load<F, E>(
        &mut self,
        id: &EndpointId,
        loader: F,
    ) -> Result<(&KeyRecord, CacheOutcome), E>
    where
        F: FnOnce(&EndpointId) -> Result<KeyMaterial, E>,
        E: From<CacheError>,
    {
        if let Some(slot) = self.index.get(id) {
            self.stats.hits += 1;
            let record = self.promote(slot)?;
            return Ok((record, CacheOutcome::Hit));
        }

        let key = loader(id)?;
        Ok(self.insert_loaded(*id, key)?)
    }

    /// Look up `id` without loading. Promotes on a hit.
    pub fn get(&mut self, id: &EndpointId) -> Result<Option<&KeyRecord>, CacheError> {
        let Some(slot) = self.index.get(id) else {
            return Ok(None);
        };

        self.stats.hits += 1;
        self.promote(slot).map(Some)
    }

    /// Insert a key that was loaded outside the cache.
    ///
    /// If `id` became resident in the meantime the resident key wins and the
    /// lookup counts as a hit; `key` is dropped (and zeroized).
    pub fn insert_loaded(
        &mut self,
        id: EndpointId,
        key: KeyMaterial,
    ) -> Result<(&KeyRecord, CacheOutcome), CacheError> {
        if let Some(slot) = self.index.get(&id) {
            self.stats.hits += 1;
            let record = self.promote(slot)?;
            return Ok((record, CacheOutcome::Hit));
        }

        if self.list.len() >= self.capacity {
            let evicted = self.evict()?;
            debug_assert!(evicted.is_some(), "full cache must have a victim");
        }

        let slot = self.list.push_front(id, key)?;
        if let Some(stale) = self.index.insert(id, slot) {
            return Err(CacheError::Consistency(format!(
                "id {id} was indexed at slot {stale} but absent from lookup"
            )));
        }
        self.stats.misses += 1;
        debug!(endpoint = %id, len = self.list.len(), "cached key");

        self.debug_verify();

        let record = self.record(slot)?;
        Ok((record, CacheOutcome::Miss))
    }

    /// Remove the least recently used record from both structures.
    ///
    /// Returns `None` if the cache is empty.
    pub fn evict(&mut self) -> Result<Option<KeyRecord>, CacheError> {
        let Some(record) = self.list.pop_back()? else {
            return Ok(None);
        };

        if self.index.remove(record.id()).is_none() {
            return Err(CacheError::Consistency(format!(
                "evicted id {} was not indexed",
                record.id()
            )));
        }
        self.stats.evictions += 1;
        debug!(endpoint = %record.id(), "evicted key");

        Ok(Some(record))
    }

    /// Cached ids from most to least recently used.
    pub fn ids_by_recency(&self) -> Result<Vec<EndpointId>, CacheError> {
        Ok(self.list.walk()?.into_iter().map(|(_, id)| id).collect())
    }

    /// Check that index and list agree and the capacity bound holds.
    pub fn verify_consistency(&self) -> Result<(), CacheError> {
        let walked = self.list.walk()?;

        if walked.len() > self.capacity {
            return Err(CacheError::Consistency(format!(
                "{} records exceed capacity {}",
                walked.len(),
                self.capacity
            )));
        }
        if walked.len() != self.index.len() {
            return Err(CacheError::Consistency(format!(
                "list holds {} records, index holds {}",
                walked.len(),
                self.index.len()
            )));
        }
        for (slot, id) in &walked {
            if self.index.get(id) != Some(*slot) {
                return Err(CacheError::Consistency(format!(
                    "id {id} in list at slot {slot} but indexed at {:?}",
                    self.index.get(id)
                )));
            }
        }

        Ok(())
    }

    /// Drop every cached key. Counters are kept.
    pub fn clear(&mut self) {
        self.index.clear();
        self.list.clear();
    }

    fn promote(&mut self, slot: Slot) -> Result<&KeyRecord, CacheError> {
        self.list.move_to_front(slot)?;
        self.record(slot)
    }

    fn record(&self, slot: Slot) -> Result<&KeyRecord, CacheError> {
        self.list
            .get(slot)
            .ok_or_else(|| CacheError::Consistency(format!("indexed slot {slot} is empty")))
    }

    fn debug_verify(&self) {
        #[cfg(debug_assertions)]
        {
            let result = self.verify_consistency();
            debug_assert!(result.is_ok(), "cache consistency check failed: {result:?}");
        }
    }
}
