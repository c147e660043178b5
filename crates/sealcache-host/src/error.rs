use sealcache_core::{CommandError, Error, StoreError};
use thiserror::Error;

/// Host-level errors
#[derive(Debug, Error)]
pub enum HostError {
    /// Key store failure outside the pipeline (opening, provisioning)
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Pipeline construction or configuration failure
    #[error("{0}")]
    Core(#[from] Error),

    /// Reencrypt command failure
    #[error("reencrypt command failed: {0}")]
    Command(#[from] CommandError),

    /// Re-encrypted output did not decrypt to the original plaintext
    #[error("round {round}: receiver could not recover the plaintext")]
    Verification {
        /// Benchmark round that failed verification
        round: usize,
    },

    /// Invalid benchmark parameters
    #[error("invalid benchmark configuration: {0}")]
    InvalidBench(String),
}
