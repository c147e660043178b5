use thiserror::Error;

use crate::endpoint::EndpointId;

/// Key store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No key stored for this endpoint and the not-found policy is to fail
    #[error("no key stored for endpoint {0}")]
    NotFound(EndpointId),

    /// Stored value is not a valid key
    #[error("stored key for endpoint {id} is corrupt: {reason}")]
    Corrupt {
        /// Endpoint whose record is corrupt
        id: EndpointId,
        /// What was wrong with it
        reason: String,
    },

    /// I/O error in the underlying store
    #[error("store I/O error: {0}")]
    Io(String),
}

impl StoreError {
    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
