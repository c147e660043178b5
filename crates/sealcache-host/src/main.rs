//! Sealcache benchmark host.
//!
//! # Usage
//!
//! ```bash
//! # In-memory keys, default cache
//! sealcache-host --endpoints 64 --rounds 10000
//!
//! # Durable keys, small cache to force evictions
//! sealcache-host --db keys.redb --capacity 16 --endpoints 64
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use sealcache_core::{
    DEFAULT_CACHE_CAPACITY, IvPolicy, MemoryKeyStore, NotFoundPolicy, ReencryptionPipeline,
    RelayConfig,
};
use sealcache_crypto::IV_SIZE;
use sealcache_host::{BenchConfig, HostKeyStore, RedbKeyStore, SystemEnv, run_benchmark};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// What to do when an endpoint has no stored key
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OnMissing {
    /// Generate and persist a new key
    Synthesize,
    /// Abort the message
    Fail,
}

impl From<OnMissing> for NotFoundPolicy {
    fn from(value: OnMissing) -> Self {
        match value {
            OnMissing::Synthesize => Self::Synthesize,
            OnMissing::Fail => Self::Fail,
        }
    }
}

/// Sealcache re-encryption benchmark
#[derive(Parser, Debug)]
#[command(name = "sealcache-host")]
#[command(about = "Benchmark the sealcache key cache and re-encryption pipeline")]
#[command(version)]
struct Args {
    /// Path to a redb key database. Keys are kept in memory if omitted
    #[arg(long)]
    db: Option<PathBuf>,

    /// Maximum number of cached endpoint keys
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY)]
    capacity: usize,

    /// Behaviour when the store has no key for an endpoint
    #[arg(long, value_enum, default_value = "synthesize")]
    on_missing: OnMissing,

    /// Use a constant outbound IV (benchmarking only, insecure)
    #[arg(long)]
    fixed_iv: bool,

    /// Number of distinct endpoints
    #[arg(long, default_value = "8")]
    endpoints: usize,

    /// Number of messages to re-encrypt
    #[arg(long, default_value = "1000")]
    rounds: usize,

    /// Payload size in 16-byte blocks
    #[arg(long, default_value = "4")]
    payload_blocks: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let store = match &args.db {
        Some(path) => HostKeyStore::Durable(RedbKeyStore::open(path)?),
        None => HostKeyStore::Memory(MemoryKeyStore::new()),
    };

    let config = RelayConfig {
        cache_capacity: args.capacity,
        not_found_policy: args.on_missing.into(),
        iv_policy: if args.fixed_iv { IvPolicy::Fixed([0; IV_SIZE]) } else { IvPolicy::Random },
    };

    tracing::info!(
        key_mode = store.mode(),
        capacity = config.cache_capacity,
        endpoints = args.endpoints,
        rounds = args.rounds,
        "sealcache host starting"
    );

    let env = SystemEnv::new();
    let pipeline = ReencryptionPipeline::new(config, store, env)?;

    let bench = BenchConfig {
        endpoints: args.endpoints,
        rounds: args.rounds,
        payload_blocks: args.payload_blocks,
    };
    let report = run_benchmark(&pipeline, &env, bench)?;

    tracing::info!("{report}");

    Ok(())
}
