//! Deterministic test support for sealcache.
//!
//! - [`SimEnv`]: seeded ChaCha RNG and a virtual clock, so IVs, synthesized
//!   keys and stage timings are reproducible from a seed
//! - [`ProbeStore`]: in-memory key store that counts calls per endpoint, can
//!   charge virtual latency per call, and can be sealed so any further `get`
//!   fails

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod probe_store;
pub mod sim_env;

pub use probe_store::ProbeStore;
pub use sim_env::SimEnv;
