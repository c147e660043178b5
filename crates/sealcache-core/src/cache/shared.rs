//! Thread-safe handle to a [`KeyCache`].

use std::sync::{Arc, Mutex, MutexGuard};

use sealcache_crypto::KeyMaterial;

use super::{CacheError, CacheOutcome, CacheStats, KeyCache, KeyRecord};
use crate::endpoint::EndpointId;

/// Shared LRU key cache.
///
/// Cloning is cheap and every clone refers to the same cache. One lock guards
/// the whole cache, and it stays held across the loader on a miss. Concurrent
/// misses on one id therefore load it exactly once, so a key the loader
/// synthesizes and persists is the key the cache serves.
#[derive(Debug, Clone)]
pub struct SharedKeyCache {
    inner: Arc<Mutex<KeyCache>>,
}

impl SharedKeyCache {
    /// Create an empty shared cache holding at most `capacity` keys.
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        Ok(Self::from_cache(KeyCache::new(capacity)?))
    }

    /// Wrap an existing cache.
    pub fn from_cache(cache: KeyCache) -> Self {
        Self { inner: Arc::new(Mutex::new(cache)) }
    }

    /// Look up `id`, loading it on a miss.
    ///
    /// The loader runs with the lock held. Returns a copy of the key so the
    /// lock is not held while the caller uses it. The copy is zeroized when
    /// dropped.
    pub fn lookup_or_load<F, E>(
        &self,
        id: &EndpointId,
        loader: F,
    ) -> Result<(KeyMaterial, CacheOutcome), E>
    where
        F: FnOnce(&EndpointId) -> Result<KeyMaterial, E>,
        E: From<CacheError>,
    {
        let mut cache = self.lock()?;
        let (record, outcome) = cache.lookup_or_load(id, loader)?;
        Ok((record.key().clone(), outcome))
    }

    /// Number of cached keys.
    pub fn len(&self) -> Result<usize, CacheError> {
        Ok(self.lock()?.len())
    }

    /// True if no keys are cached.
    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.lock()?.is_empty())
    }

    /// Maximum number of cached keys.
    pub fn capacity(&self) -> Result<usize, CacheError> {
        Ok(self.lock()?.capacity())
    }

    /// True if `id` is cached. Does not affect recency.
    pub fn contains(&self, id: &EndpointId) -> Result<bool, CacheError> {
        Ok(self.lock()?.contains(id))
    }

    /// Hit/miss/eviction counters.
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        Ok(self.lock()?.stats())
    }

    /// Cached ids from most to least recently used.
    pub fn ids_by_recency(&self) -> Result<Vec<EndpointId>, CacheError> {
        self.lock()?.ids_by_recency()
    }

    /// Check that index and list agree and the capacity bound holds.
    pub fn verify_consistency(&self) -> Result<(), CacheError> {
        self.lock()?.verify_consistency()
    }

    /// Remove the least recently used record.
    pub fn evict(&self) -> Result<Option<KeyRecord>, CacheError> {
        self.lock()?.evict()
    }

    /// Drop every cached key.
    pub fn clear(&self) -> Result<(), CacheError> {
        self.lock()?.clear();
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, KeyCache>, CacheError> {
        self.inner.lock().map_err(|_| CacheError::Poisoned)
    }
}
