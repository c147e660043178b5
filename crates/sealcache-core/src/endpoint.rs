//! Endpoint identifiers.
//!
//! An endpoint id names one client of the relay. It is the cache key and the
//! store key. Ids are opaque bytes of bounded width; on the wire they occupy
//! a fixed [`ENDPOINT_ID_SIZE`] field padded with trailing NULs.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Maximum (and wire) width of an endpoint id in bytes
pub const ENDPOINT_ID_SIZE: usize = 12;

/// Errors from constructing an [`EndpointId`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointIdError {
    /// Id has no bytes (or only NUL padding)
    #[error("endpoint id is empty")]
    Empty,

    /// Id is wider than the fixed maximum
    #[error("endpoint id is {len} bytes, maximum is {max}")]
    TooLong {
        /// Supplied length
        len: usize,
        /// Maximum length
        max: usize,
    },
}

/// Bounded-width opaque endpoint identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId {
    bytes: [u8; ENDPOINT_ID_SIZE],
    len: u8,
}

impl EndpointId {
    /// Build an id from 1..=[`ENDPOINT_ID_SIZE`] bytes.
    pub fn new(id: &[u8]) -> Result<Self, EndpointIdError> {
        if id.is_empty() {
            return Err(EndpointIdError::Empty);
        }
        if id.len() > ENDPOINT_ID_SIZE {
            return Err(EndpointIdError::TooLong { len: id.len(), max: ENDPOINT_ID_SIZE });
        }

        let mut bytes = [0u8; ENDPOINT_ID_SIZE];
        bytes[..id.len()].copy_from_slice(id);
        Ok(Self { bytes, len: id.len() as u8 })
    }

    /// Parse a fixed-width wire field, stripping trailing NUL padding.
    pub fn from_wire(field: &[u8]) -> Result<Self, EndpointIdError> {
        let end = field.iter().rposition(|&b| b != 0).map_or(0, |last| last + 1);
        Self::new(&field[..end])
    }

    /// Id bytes without padding.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Fixed-width NUL-padded wire encoding.
    pub fn to_wire(&self) -> [u8; ENDPOINT_ID_SIZE] {
        self.bytes
    }
}

impl FromStr for EndpointId {
    type Err = EndpointIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.as_bytes())
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(self.as_bytes()) {
            Ok(text) if text.chars().all(|c| c.is_ascii_graphic()) => f.write_str(text),
            _ => {
                f.write_str("0x")?;
                for byte in self.as_bytes() {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            },
        }
    }
}

impl fmt::Debug for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndpointId({self})")
    }
}
