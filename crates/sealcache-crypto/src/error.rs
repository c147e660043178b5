//! Error types for cipher session operations

use thiserror::Error;

use crate::session::SessionState;

/// Errors from key material handling and cipher session operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    /// Session method called out of sequence
    #[error("cannot {operation} while session is {state}")]
    Ordering {
        /// Operation that was attempted
        operation: &'static str,
        /// State the session was in
        state: SessionState,
    },

    /// IV length does not match the cipher's required length
    #[error("invalid IV length: expected {expected}, got {actual}")]
    InvalidIvLength {
        /// Required IV length
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Key length does not match the cipher's key size
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Required key length
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Input is not a whole number of cipher blocks
    #[error("input length {len} is not a multiple of the {block_size}-byte block size")]
    MisalignedInput {
        /// Input length in bytes
        len: usize,
        /// Cipher block size
        block_size: usize,
    },

    /// Output buffer cannot hold the result
    #[error("output buffer too small: need {required} bytes, have {actual}")]
    ShortBuffer {
        /// Bytes needed
        required: usize,
        /// Bytes available
        actual: usize,
    },

    /// Buffer allocation for the cipher output failed
    #[error("failed to allocate {requested} bytes for cipher output")]
    Resource {
        /// Bytes requested
        requested: usize,
    },
}

impl CipherError {
    /// Returns true if the error was caused by the caller's input shape
    /// rather than by session misuse or resource exhaustion.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidIvLength { .. }
                | Self::InvalidKeyLength { .. }
                | Self::MisalignedInput { .. }
                | Self::ShortBuffer { .. }
        )
    }
}
