//! Relay configuration knobs.

use sealcache_crypto::IV_SIZE;

use crate::error::Error;

/// Default number of endpoint keys held in the cache
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// What a cache miss does when the store has no key for the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotFoundPolicy {
    /// Generate a random key, persist it, and continue
    #[default]
    Synthesize,
    /// Abort the message with a store error
    Fail,
}

/// How the outbound IV is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IvPolicy {
    /// Fresh random IV per message
    #[default]
    Random,
    /// Constant IV for reproducible benchmarks.
    ///
    /// Reuses the IV across messages under the same key. Never use outside
    /// benchmarking.
    Fixed([u8; IV_SIZE]),
}

/// Configuration for a [`crate::ReencryptionPipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Maximum number of keys in the cache
    pub cache_capacity: usize,
    /// Behaviour when the store has no key for an endpoint
    pub not_found_policy: NotFoundPolicy,
    /// Outbound IV generation
    pub iv_policy: IvPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            not_found_policy: NotFoundPolicy::default(),
            iv_policy: IvPolicy::default(),
        }
    }
}

impl RelayConfig {
    /// Check the configuration before building a pipeline.
    pub fn validate(&self) -> Result<(), Error> {
        if self.cache_capacity == 0 {
            return Err(Error::Configuration("cache_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}
