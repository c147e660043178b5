//! Sealcache Cryptographic Primitives
//!
//! Key material types and the block-cipher session used to re-encrypt
//! payloads inside the protected domain. The session wraps AES-256 in CBC
//! mode without padding, so callers are responsible for block alignment.
//!
//! # Session Lifecycle
//!
//! ```text
//! Uninitialized ──configure──▶ Configured ──set_iv──▶ Active ──transform──▶ Active
//!       │                          ▲                    │
//!       │                          └─────configure──────┘
//!       └──────────────close (from any state)──────────────▶ Closed
//! ```
//!
//! A session can be re-keyed any number of times before it is closed.
//! Re-keying drops the previous key and cipher state, which zeroizes them.
//!
//! # Security
//!
//! - `KeyMaterial` is zeroized on drop and never printed by `Debug`
//! - Closing a session (explicitly or by dropping it) wipes the key and the
//!   expanded round keys
//! - An IV must never be reused with the same key for two messages; callers
//!   generate a fresh random IV per encryption

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod key;
mod session;

pub use error::CipherError;
pub use key::{BLOCK_SIZE, IV_SIZE, Iv, KEY_SIZE, KeyMaterial};
pub use session::{CipherSession, Direction, SessionState};
