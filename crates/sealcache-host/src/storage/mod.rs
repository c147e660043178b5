//! Key store implementations for the host.
//!
//! Keys can live in memory for the lifetime of the process or durably in a
//! redb file. [`HostKeyStore`] lets the binary choose at runtime.

mod redb;

use sealcache_core::{EndpointId, MemoryKeyStore, SecureKeyStore, StoreError};
use sealcache_crypto::KeyMaterial;

pub use self::redb::RedbKeyStore;

/// Runtime-selected key store.
#[derive(Debug, Clone)]
pub enum HostKeyStore {
    /// Keys held in process memory, lost on exit
    Memory(MemoryKeyStore),
    /// Keys persisted to a redb database
    Durable(RedbKeyStore),
}

impl HostKeyStore {
    /// Short name for logging.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Durable(_) => "durable",
        }
    }
}

impl SecureKeyStore for HostKeyStore {
    fn get(&self, id: &EndpointId) -> Result<Option<KeyMaterial>, StoreError> {
        match self {
            Self::Memory(store) => store.get(id),
            Self::Durable(store) => store.get(id),
        }
    }

    fn put(&self, id: &EndpointId, key: &KeyMaterial) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.put(id, key),
            Self::Durable(store) => store.put(id, key),
        }
    }
}
