//! Durable key store abstraction
//!
//! The cache sits in front of a [`SecureKeyStore`]. The trait is synchronous:
//! a store call blocks the invocation that made it, which is the cost the
//! cache exists to avoid.

mod chaotic;
mod error;
mod memory;

pub use chaotic::ChaoticKeyStore;
pub use error::StoreError;
pub use memory::MemoryKeyStore;
use sealcache_crypto::KeyMaterial;

use crate::endpoint::EndpointId;

/// Durable per-endpoint key storage.
///
/// Must be Clone (shared by the pipeline and the loader), Send + Sync, and
/// synchronous. Implementations share internal state via Arc, so clones see
/// the same keys.
pub trait SecureKeyStore: Clone + Send + Sync + 'static {
    /// Fetch the key stored for `id`.
    ///
    /// Returns `None` if nothing is stored under `id`.
    fn get(&self, id: &EndpointId) -> Result<Option<KeyMaterial>, StoreError>;

    /// Persist `key` for `id`, overwriting any existing key.
    ///
    /// # Invariants
    ///
    /// - Post: a subsequent `get(id)` returns `key`
    fn put(&self, id: &EndpointId, key: &KeyMaterial) -> Result<(), StoreError>;
}
