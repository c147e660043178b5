//! Production environment using the monotonic clock and OS RNG.

use sealcache_core::Environment;

/// Production environment.
///
/// Uses `std::time::Instant::now()` for stage timing and getrandom for IVs and
/// synthesized keys.
///
/// # Panics
///
/// Panics if the OS RNG fails. Without working randomness the relay cannot
/// generate IVs or keys, so there is nothing safe to fall back to.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}
