//! End-to-end benchmark runner.
//!
//! Provisions a set of endpoints, then for each round encrypts a random
//! payload under the sender's key, pushes it through the reencrypt command
//! exactly as the dispatch layer would, and checks that the receiver's key
//! recovers the payload. Stage timings are accumulated per stage.

use std::{collections::HashMap, fmt, time::Duration};

use sealcache_core::{
    CacheStats, EndpointId, Environment, Error, ReencryptCommand, ReencryptionPipeline,
    SecureKeyStore, Stage, StageTimings, encode_request,
};
use sealcache_crypto::{BLOCK_SIZE, CipherSession, Direction, KeyMaterial};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::error::HostError;

/// Benchmark shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchConfig {
    /// Distinct endpoints messages are exchanged between
    pub endpoints: usize,
    /// Messages to re-encrypt
    pub rounds: usize,
    /// Payload size in cipher blocks
    pub payload_blocks: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self { endpoints: 8, rounds: 1000, payload_blocks: 4 }
    }
}

/// Summed stage times across all rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTotals {
    totals: [Duration; Stage::COUNT],
}

impl StageTotals {
    fn add(&mut self, timings: &StageTimings) {
        for (slot, stage) in self.totals.iter_mut().zip(Stage::ALL) {
            *slot += timings.get(stage).elapsed;
        }
    }

    /// Total time spent in `stage`.
    pub fn get(&self, stage: Stage) -> Duration {
        Stage::ALL
            .iter()
            .position(|&s| s == stage)
            .map_or(Duration::ZERO, |i| self.totals[i])
    }

    /// Mean time per round spent in `stage`.
    pub fn mean(&self, stage: Stage, rounds: usize) -> Duration {
        match u32::try_from(rounds) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(n) => self.get(stage) / n,
        }
    }
}

/// Result of a benchmark run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchReport {
    /// Rounds completed and verified
    pub rounds: usize,
    /// Bytes of ciphertext re-encrypted per round
    pub payload_bytes: usize,
    /// Per-stage time summed over all rounds
    pub totals: StageTotals,
    /// Cache counters at the end of the run
    pub cache: CacheStats,
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rounds of {} bytes;", self.rounds, self.payload_bytes)?;
        for stage in Stage::ALL {
            let mean = self.totals.mean(stage, self.rounds);
            write!(f, " {stage}={:.3}ms", mean.as_secs_f64() * 1000.0)?;
        }
        write!(
            f,
            "; cache hits={} misses={} evictions={}",
            self.cache.hits, self.cache.misses, self.cache.evictions
        )
    }
}

/// Endpoint id used for the `index`-th benchmark endpoint.
pub fn bench_endpoint(index: usize) -> Result<EndpointId, HostError> {
    format!("{index:012}")
        .parse()
        .map_err(|err| HostError::InvalidBench(format!("endpoint {index}: {err}")))
}

/// Run `config.rounds` messages through `pipeline`.
///
/// Endpoints without a stored key are provisioned with a fresh key first;
/// existing keys are reused, so a durable store carries keys across runs.
pub fn run_benchmark<S: SecureKeyStore, E: Environment>(
    pipeline: &ReencryptionPipeline<S, E>,
    env: &E,
    config: BenchConfig,
) -> Result<BenchReport, HostError> {
    if config.endpoints == 0 || config.payload_blocks == 0 {
        return Err(HostError::InvalidBench(
            "endpoints and payload blocks must be at least 1".to_string(),
        ));
    }

    let keys = provision(pipeline.store(), env, config.endpoints)?;
    let ids: Vec<EndpointId> =
        (0..config.endpoints).map(bench_endpoint).collect::<Result<_, _>>()?;
    let payload_bytes = config.payload_blocks * BLOCK_SIZE;

    let mut totals = StageTotals::default();
    let mut plaintext = Zeroizing::new(vec![0u8; payload_bytes]);
    let mut output = Vec::new();

    for round in 0..config.rounds {
        let sender = ids[round % ids.len()];
        let receiver = ids[(round * 7 + 1) % ids.len()];

        env.random_bytes(&mut plaintext);
        let iv = env.random_iv();
        let ciphertext =
            cbc(Direction::Encrypt, key_of(&keys, &sender)?, iv.as_bytes(), &plaintext)?;
        let request = encode_request(&sender, &iv, &ciphertext);

        let command = ReencryptCommand::parse(&request, &receiver.to_wire())?;
        output.resize(command.required_output_len(), 0);
        let result = command.execute(pipeline, &mut output)?;

        let (new_iv, new_ciphertext) = output[..result.written].split_at(iv.as_bytes().len());
        let recovered = cbc(Direction::Decrypt, key_of(&keys, &receiver)?, new_iv, new_ciphertext)?;
        if recovered.as_slice() != plaintext.as_slice() {
            return Err(HostError::Verification { round });
        }

        debug!(round, %sender, %receiver, timings = %result.timings, "round complete");
        totals.add(&result.timings);
    }

    let report = BenchReport {
        rounds: config.rounds,
        payload_bytes,
        totals,
        cache: pipeline.cache().stats().map_err(Error::from)?,
    };
    info!(%report, "benchmark finished");
    Ok(report)
}

fn provision<S: SecureKeyStore, E: Environment>(
    store: &S,
    env: &E,
    endpoints: usize,
) -> Result<HashMap<EndpointId, KeyMaterial>, HostError> {
    let mut keys = HashMap::with_capacity(endpoints);
    let mut created = 0usize;

    for index in 0..endpoints {
        let id = bench_endpoint(index)?;
        let key = match store.get(&id)? {
            Some(key) => key,
            None => {
                let key = env.random_key();
                store.put(&id, &key)?;
                created += 1;
                key
            },
        };
        keys.insert(id, key);
    }

    info!(endpoints, created, "provisioned endpoint keys");
    Ok(keys)
}

fn key_of<'a>(
    keys: &'a HashMap<EndpointId, KeyMaterial>,
    id: &EndpointId,
) -> Result<&'a KeyMaterial, HostError> {
    keys.get(id)
        .ok_or_else(|| HostError::InvalidBench(format!("endpoint {id} was not provisioned")))
}

fn cbc(
    direction: Direction,
    key: &KeyMaterial,
    iv: &[u8],
    input: &[u8],
) -> Result<Zeroizing<Vec<u8>>, HostError> {
    let mut session = CipherSession::new();
    session.configure(direction, key).map_err(Error::from)?;
    session.set_iv(iv).map_err(Error::from)?;
    Ok(session.transform(input).map_err(Error::from)?)
}
