//! Environment abstraction for deterministic testing.
//!
//! Decouples the pipeline from system resources (time, randomness). Tests use
//! a seeded RNG and a virtual clock; production uses the OS RNG and a
//! monotonic clock.

use std::time::Duration;

use sealcache_crypto::{IV_SIZE, Iv, KEY_SIZE, KeyMaterial};
use zeroize::Zeroizing;

/// Abstract environment providing time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
pub trait Environment: Clone + Send + Sync + 'static {
    /// The instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, simulation
    /// environments use a virtual clock.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Fills the provided buffer with random bytes.
    ///
    /// Given the same RNG seed, this produces the same sequence of bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a fresh random IV.
    fn random_iv(&self) -> Iv {
        let mut bytes = [0u8; IV_SIZE];
        self.random_bytes(&mut bytes);
        Iv::from_bytes(bytes)
    }

    /// Generates fresh random key material.
    fn random_key(&self) -> KeyMaterial {
        let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
        self.random_bytes(bytes.as_mut_slice());
        KeyMaterial::from_bytes(*bytes)
    }

    /// Time elapsed since `start`.
    fn elapsed_since(&self, start: Self::Instant) -> Duration {
        self.now() - start
    }
}
