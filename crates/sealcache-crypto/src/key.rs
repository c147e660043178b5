//! Fixed-size key material and initialization vectors.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CipherError;

/// AES-256 key size in bytes
pub const KEY_SIZE: usize = 32;

/// CBC initialization vector size in bytes
pub const IV_SIZE: usize = 16;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Secret symmetric key for one endpoint.
///
/// Opaque fixed-length bytes supplied by the key store. Zeroized on drop.
/// `Debug` output is redacted so keys cannot leak through logs.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial([u8; KEY_SIZE]);

impl KeyMaterial {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copy key bytes out of a slice, validating the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CipherError> {
        let Ok(key) = <[u8; KEY_SIZE]>::try_from(bytes) else {
            return Err(CipherError::InvalidKeyLength { expected: KEY_SIZE, actual: bytes.len() });
        };
        Ok(Self(key))
    }

    /// Raw key bytes.
    ///
    /// Only for handing the key to a cipher or a store. Never log the result.
    pub fn expose(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial([REDACTED])")
    }
}

/// CBC initialization vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Iv([u8; IV_SIZE]);

impl Iv {
    /// Wrap raw IV bytes.
    pub fn from_bytes(bytes: [u8; IV_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copy IV bytes out of a slice, validating the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CipherError> {
        let Ok(iv) = <[u8; IV_SIZE]>::try_from(bytes) else {
            return Err(CipherError::InvalidIvLength { expected: IV_SIZE, actual: bytes.len() });
        };
        Ok(Self(iv))
    }

    /// Raw IV bytes.
    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.0
    }
}
