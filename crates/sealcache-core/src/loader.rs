//! Cache-miss key loading.

use sealcache_crypto::KeyMaterial;
use tracing::{debug, warn};

use crate::{
    config::NotFoundPolicy,
    endpoint::EndpointId,
    env::Environment,
    store::{SecureKeyStore, StoreError},
};

/// Fetches a key from the store on a cache miss, applying the
/// [`NotFoundPolicy`] when the store has nothing for the endpoint.
#[derive(Debug)]
pub struct KeyLoader<'a, S, E> {
    store: &'a S,
    env: &'a E,
    policy: NotFoundPolicy,
}

impl<'a, S: SecureKeyStore, E: Environment> KeyLoader<'a, S, E> {
    /// Create a loader over `store`.
    pub fn new(store: &'a S, env: &'a E, policy: NotFoundPolicy) -> Self {
        Self { store, env, policy }
    }

    /// Load the key for `id`.
    ///
    /// Under [`NotFoundPolicy::Synthesize`] a missing key is generated from
    /// the environment's RNG and persisted before it is returned. If the put
    /// fails the error is returned and no key is handed out.
    pub fn load(&self, id: &EndpointId) -> Result<KeyMaterial, StoreError> {
        if let Some(key) = self.store.get(id)? {
            debug!(endpoint = %id, "loaded key from store");
            return Ok(key);
        }

        match self.policy {
            NotFoundPolicy::Fail => Err(StoreError::NotFound(*id)),
            NotFoundPolicy::Synthesize => {
                let key = self.env.random_key();
                self.store.put(id, &key)?;
                warn!(endpoint = %id, "no stored key, synthesized and persisted a new one");
                Ok(key)
            },
        }
    }
}
