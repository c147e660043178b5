//! Fault-injecting key store wrapper
//!
//! Randomly fails store operations so tests can check that a failed load
//! never leaves the cache half-updated.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use sealcache_crypto::KeyMaterial;

use super::{SecureKeyStore, StoreError};
use crate::endpoint::EndpointId;

/// Key store wrapper that fails a configurable fraction of operations
///
/// Failures are drawn from a seeded generator, so a given seed produces the
/// same failure sequence for the same call sequence.
#[derive(Debug, Clone)]
pub struct ChaoticKeyStore<S: SecureKeyStore> {
    inner: S,
    /// 0.0 never fails, 1.0 always fails
    failure_rate: f64,
    rng: Arc<Mutex<Lcg>>,
    operations: Arc<AtomicUsize>,
    injected: Arc<AtomicUsize>,
}

/// Linear congruential generator (Numerical Recipes constants).
#[derive(Debug)]
struct Lcg {
    state: u64,
}

impl Lcg {
    const A: u64 = 1_664_525;
    const C: u64 = 1_013_904_223;
    const M: u64 = 1 << 32;

    /// Next value in [0.0, 1.0)
    fn next_unit(&mut self) -> f64 {
        self.state = Self::A.wrapping_mul(self.state).wrapping_add(Self::C) % Self::M;
        self.state as f64 / Self::M as f64
    }
}

impl<S: SecureKeyStore> ChaoticKeyStore<S> {
    const DEFAULT_SEED: u64 = 0x5EA1_CAC4_E000_0001;

    /// Wrap `inner`, failing operations with probability `failure_rate`.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, Self::DEFAULT_SEED)
    }

    /// Wrap `inner` with an explicit seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(Lcg { state: seed })),
            operations: Arc::new(AtomicUsize::new(0)),
            injected: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wrapped store, for checking state after chaos.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Operations attempted through this wrapper.
    pub fn operation_count(&self) -> usize {
        self.operations.load(Ordering::Relaxed)
    }

    /// Operations that were failed on purpose.
    pub fn injected_failures(&self) -> usize {
        self.injected.load(Ordering::Relaxed)
    }

    fn roll(&self, operation: &str) -> Result<(), StoreError> {
        self.operations.fetch_add(1, Ordering::Relaxed);

        let roll = self.rng.lock().unwrap_or_else(PoisonError::into_inner).next_unit();
        if roll < self.failure_rate {
            self.injected.fetch_add(1, Ordering::Relaxed);
            return Err(StoreError::Io(format!("injected {operation} failure")));
        }
        Ok(())
    }
}

impl<S: SecureKeyStore> SecureKeyStore for ChaoticKeyStore<S> {
    fn get(&self, id: &EndpointId) -> Result<Option<KeyMaterial>, StoreError> {
        self.roll("get")?;
        self.inner.get(id)
    }

    fn put(&self, id: &EndpointId, key: &KeyMaterial) -> Result<(), StoreError> {
        self.roll("put")?;
        self.inner.put(id, key)
    }
}
