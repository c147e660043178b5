use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
};

use sealcache_crypto::KeyMaterial;

use super::{SecureKeyStore, StoreError};
use crate::endpoint::EndpointId;

/// In-memory key store for tests, simulation and memory-backed key mode
///
/// Counts every `get` and `put` so tests can assert how often the cache
/// reached the store.
#[derive(Clone, Default)]
pub struct MemoryKeyStore {
    keys: Arc<Mutex<HashMap<EndpointId, KeyMaterial>>>,
    gets: Arc<AtomicUsize>,
    puts: Arc<AtomicUsize>,
}

impl MemoryKeyStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    /// True if no keys are stored.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.is_empty())
    }

    /// Total `get` calls served.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::Relaxed)
    }

    /// Total `put` calls served.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::Relaxed)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<EndpointId, KeyMaterial>>, StoreError> {
        self.keys.lock().map_err(|_| StoreError::Io("memory store lock poisoned".to_string()))
    }
}

impl std::fmt::Debug for MemoryKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryKeyStore")
            .field("gets", &self.get_count())
            .field("puts", &self.put_count())
            .finish_non_exhaustive()
    }
}

impl SecureKeyStore for MemoryKeyStore {
    fn get(&self, id: &EndpointId) -> Result<Option<KeyMaterial>, StoreError> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        Ok(self.lock()?.get(id).cloned())
    }

    fn put(&self, id: &EndpointId, key: &KeyMaterial) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        self.lock()?.insert(*id, key.clone());
        Ok(())
    }
}
