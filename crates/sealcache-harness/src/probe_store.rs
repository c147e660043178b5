//! Call-counting key store stub.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use sealcache_core::{EndpointId, MemoryKeyStore, SecureKeyStore, StoreError};
use sealcache_crypto::KeyMaterial;

use crate::SimEnv;

/// Key store that records every `get` and can refuse further ones.
///
/// After [`ProbeStore::seal`], every `get` returns an I/O error. Tests use it
/// to prove that keys they expect to be cached never reach the store again.
#[derive(Debug, Clone, Default)]
pub struct ProbeStore {
    inner: MemoryKeyStore,
    gets: Arc<Mutex<HashMap<EndpointId, usize>>>,
    sealed: Arc<AtomicBool>,
    latency: Option<(SimEnv, Duration)>,
}

impl ProbeStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Charge `latency` of virtual time on `env` for every store call.
    #[must_use]
    pub fn with_latency(mut self, env: SimEnv, latency: Duration) -> Self {
        self.latency = Some((env, latency));
        self
    }

    /// Make every later `get` fail.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
    }

    /// Allow `get` again.
    pub fn unseal(&self) {
        self.sealed.store(false, Ordering::SeqCst);
    }

    /// `get` calls made for `id`, including refused ones.
    pub fn gets_for(&self, id: &EndpointId) -> usize {
        self.gets_map().get(id).copied().unwrap_or(0)
    }

    /// Total `get` calls.
    pub fn total_gets(&self) -> usize {
        self.gets_map().values().sum()
    }

    /// Total `put` calls.
    pub fn total_puts(&self) -> usize {
        self.inner.put_count()
    }

    /// Backing memory store.
    pub fn inner(&self) -> &MemoryKeyStore {
        &self.inner
    }

    fn gets_map(&self) -> std::sync::MutexGuard<'_, HashMap<EndpointId, usize>> {
        self.gets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn charge(&self) {
        if let Some((env, latency)) = &self.latency {
            env.advance(*latency);
        }
    }
}

impl SecureKeyStore for ProbeStore {
    fn get(&self, id: &EndpointId) -> Result<Option<KeyMaterial>, StoreError> {
        *self.gets_map().entry(*id).or_insert(0) += 1;
        self.charge();

        if self.sealed.load(Ordering::SeqCst) {
            tracing::debug!(endpoint = %id, "sealed probe store refused get");
            return Err(StoreError::Io(format!("sealed store queried for {id}")));
        }
        self.inner.get(id)
    }

    fn put(&self, id: &EndpointId, key: &KeyMaterial) -> Result<(), StoreError> {
        self.charge();
        self.inner.put(id, key)
    }
}
