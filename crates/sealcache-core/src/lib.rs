//! Sealcache core
//!
//! Bounded key cache and re-encryption pipeline for a relay that terminates
//! a distinct symmetric key per endpoint. A message encrypted under the
//! sender's key is decrypted and re-encrypted under the receiver's key
//! without the plaintext or either key leaving this crate's caller, which is
//! expected to run inside an isolated execution domain.
//!
//! # Architecture
//!
//! ```text
//! Message ──▶ ReencryptionPipeline
//!                 │
//!                 ├─ SharedKeyCache ──miss──▶ KeyLoader ──▶ SecureKeyStore
//!                 │   (KeyIndex + RecencyList, LRU eviction)
//!                 │
//!                 └─ CipherSession (decrypt with sender key,
//!                                   encrypt with receiver key, fresh IV)
//! ```
//!
//! Fetching a key from the durable store is orders of magnitude slower than
//! a cache hit, so the cache is what keeps per-message cost low. Everything
//! is synchronous: a slow store call blocks the invocation that made it.
//!
//! # Components
//!
//! - [`KeyCache`] / [`SharedKeyCache`]: LRU cache of endpoint keys
//! - [`SecureKeyStore`]: durable key store seam, with [`MemoryKeyStore`] and
//!   [`ChaoticKeyStore`] implementations
//! - [`KeyLoader`]: applies the [`NotFoundPolicy`] on cache misses
//! - [`ReencryptionPipeline`]: the four-stage re-encryption with per-stage
//!   timing
//! - [`ReencryptCommand`]: byte-buffer boundary used by the dispatch layer
//! - [`Environment`]: time and randomness, injectable for deterministic tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod command;
pub mod config;
pub mod endpoint;
pub mod env;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod store;

pub use cache::{CacheError, CacheOutcome, CacheStats, KeyCache, KeyRecord, SharedKeyCache};
pub use command::{
    CommandError, CommandOutput, REQUEST_HEADER_SIZE, ReencryptCommand, encode_request,
};
pub use config::{DEFAULT_CACHE_CAPACITY, IvPolicy, NotFoundPolicy, RelayConfig};
pub use endpoint::{ENDPOINT_ID_SIZE, EndpointId, EndpointIdError};
pub use env::Environment;
pub use error::{Error, ErrorCategory, PipelineError};
pub use loader::KeyLoader;
pub use pipeline::{
    Message, Reencrypted, ReencryptionPipeline, Stage, StageObserver, StageTiming, StageTimings,
};
pub use store::{ChaoticKeyStore, MemoryKeyStore, SecureKeyStore, StoreError};
