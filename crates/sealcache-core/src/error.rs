//! Error types for the sealcache core.
//!
//! Each layer has its own error enum ([`CacheError`], [`StoreError`],
//! [`CipherError`], [`EndpointIdError`]); [`Error`] unifies them and
//! [`Error::category`] maps every failure onto the relay's error taxonomy.
//! [`PipelineError`] additionally records which re-encryption stage failed.

use sealcache_crypto::CipherError;
use thiserror::Error;

use crate::{
    cache::CacheError, endpoint::EndpointIdError, pipeline::Stage, store::StoreError,
};

/// Coarse error taxonomy shared by every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad boundary parameters or configuration
    Configuration,
    /// Allocation failure for cipher or cache structures
    Resource,
    /// Durable store unreachable, corrupt, or missing the key
    Store,
    /// Cipher session method called out of sequence
    Ordering,
    /// Misaligned input or undersized buffer
    Transform,
    /// Internal cache invariant violated
    Consistency,
}

/// Unified core error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed endpoint id
    #[error("invalid endpoint id: {0}")]
    Endpoint(#[from] EndpointIdError),

    /// Key store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Cipher session failure
    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),

    /// Cache failure
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

impl Error {
    /// Category of this error in the relay's taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::Endpoint(_) => ErrorCategory::Configuration,
            Self::Store(_) => ErrorCategory::Store,
            Self::Cipher(err) => match err {
                CipherError::Ordering { .. } => ErrorCategory::Ordering,
                CipherError::InvalidIvLength { .. } | CipherError::InvalidKeyLength { .. } => {
                    ErrorCategory::Configuration
                },
                CipherError::MisalignedInput { .. } | CipherError::ShortBuffer { .. } => {
                    ErrorCategory::Transform
                },
                CipherError::Resource { .. } => ErrorCategory::Resource,
            },
            Self::Cache(err) => match err {
                CacheError::InvalidCapacity => ErrorCategory::Configuration,
                CacheError::Consistency(_) | CacheError::Poisoned => ErrorCategory::Consistency,
            },
        }
    }

    /// Returns true if this error indicates an internal defect rather than a
    /// bad input or an unavailable store.
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Consistency
    }
}

/// A re-encryption failure, tagged with the stage where it originated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    /// Stage that failed
    pub stage: Stage,
    /// Underlying error
    #[source]
    pub source: Error,
}

impl PipelineError {
    /// Tag `source` with `stage`.
    pub fn new(stage: Stage, source: impl Into<Error>) -> Self {
        Self { stage, source: source.into() }
    }

    /// Category of the underlying error.
    pub fn category(&self) -> ErrorCategory {
        self.source.category()
    }
}

#[cfg(test)]
mod tests {
    use sealcache_crypto::SessionState;

    use super::*;
    use crate::endpoint::EndpointId;

    #[test]
    fn cipher_errors_map_to_taxonomy() {
        let ordering: Error =
            CipherError::Ordering { operation: "transform", state: SessionState::Configured }
                .into();
        assert_eq!(ordering.category(), ErrorCategory::Ordering);

        let iv: Error = CipherError::InvalidIvLength { expected: 16, actual: 3 }.into();
        assert_eq!(iv.category(), ErrorCategory::Configuration);

        let misaligned: Error = CipherError::MisalignedInput { len: 5, block_size: 16 }.into();
        assert_eq!(misaligned.category(), ErrorCategory::Transform);

        let resource: Error = CipherError::Resource { requested: 64 }.into();
        assert_eq!(resource.category(), ErrorCategory::Resource);
    }

    #[test]
    fn store_and_cache_errors_map_to_taxonomy() {
        let id = EndpointId::new(b"x").unwrap();
        assert_eq!(Error::from(StoreError::NotFound(id)).category(), ErrorCategory::Store);

        let broken = Error::from(CacheError::Consistency("dangling slot".to_string()));
        assert_eq!(broken.category(), ErrorCategory::Consistency);
        assert!(broken.is_fatal());

        assert!(!Error::from(StoreError::Io("timeout".to_string())).is_fatal());
    }

    #[test]
    fn pipeline_error_reports_stage() {
        let err = PipelineError::new(Stage::ReceiverKey, StoreError::Io("unreachable".to_string()));
        assert_eq!(err.stage, Stage::ReceiverKey);
        assert_eq!(err.category(), ErrorCategory::Store);
        assert!(err.to_string().starts_with("receiver_key stage failed"));
    }
}
