//! Sealcache host glue.
//!
//! Wraps [`sealcache_core`] with real resources: the OS RNG and monotonic
//! clock, a redb-backed durable key store, and a benchmark runner that drives
//! the reencrypt command end to end.
//!
//! # Components
//!
//! - [`SystemEnv`]: production environment (real time, OS RNG)
//! - [`RedbKeyStore`]: durable endpoint key store
//! - [`HostKeyStore`]: runtime choice between in-memory and durable keys
//! - [`run_benchmark`]: provisions endpoints and measures per-stage cost

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bench;
mod error;
pub mod storage;
mod system_env;

pub use bench::{BenchConfig, BenchReport, StageTotals, bench_endpoint, run_benchmark};
pub use error::HostError;
pub use storage::{HostKeyStore, RedbKeyStore};
pub use system_env::SystemEnv;
