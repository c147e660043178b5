//! Four-stage re-encryption from a sender's key to a receiver's key.
//!
//! ```text
//! SenderKey ──▶ Decrypt ──▶ ReceiverKey ──▶ Encrypt
//!  (cache)      (CBC)        (cache)        (CBC, fresh IV)
//! ```
//!
//! Each invocation owns its own [`CipherSession`] and closes it on every exit
//! path. The plaintext lives only in a zeroizing buffer between the decrypt
//! and encrypt stages. Any stage failure aborts the whole message and is
//! reported as a [`PipelineError`] carrying the stage.

mod timing;

use std::{fmt, sync::Arc};

use sealcache_crypto::{CipherError, CipherSession, Direction, Iv, KeyMaterial};
use tracing::{debug, warn};
use zeroize::Zeroizing;

pub use self::timing::{StageObserver, StageTiming, StageTimings};
use crate::{
    cache::{CacheOutcome, SharedKeyCache},
    config::{IvPolicy, RelayConfig},
    endpoint::EndpointId,
    env::Environment,
    error::{Error, PipelineError},
    loader::KeyLoader,
    store::SecureKeyStore,
};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Resolve the sender's key through the cache
    SenderKey,
    /// Decrypt the inbound ciphertext with the sender's key
    Decrypt,
    /// Resolve the receiver's key through the cache
    ReceiverKey,
    /// Encrypt the plaintext with the receiver's key under a fresh IV
    Encrypt,
}

impl Stage {
    /// Number of stages
    pub const COUNT: usize = 4;

    /// Every stage, in execution order.
    pub const ALL: [Self; Self::COUNT] =
        [Self::SenderKey, Self::Decrypt, Self::ReceiverKey, Self::Encrypt];

    /// Stable snake_case name, used in logs and timing headers.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SenderKey => "sender_key",
            Self::Decrypt => "decrypt",
            Self::ReceiverKey => "receiver_key",
            Self::Encrypt => "encrypt",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inbound message.
#[derive(Debug, Clone, Copy)]
pub struct Message<'a> {
    /// Endpoint whose key encrypted `ciphertext`
    pub sender: EndpointId,
    /// Endpoint the result is re-encrypted for
    pub receiver: EndpointId,
    /// IV the sender used
    pub iv: &'a [u8],
    /// Block-aligned ciphertext under the sender's key
    pub ciphertext: &'a [u8],
}

impl<'a> Message<'a> {
    /// Bundle the parts of an inbound message.
    pub fn new(
        sender: EndpointId,
        receiver: EndpointId,
        iv: &'a [u8],
        ciphertext: &'a [u8],
    ) -> Self {
        Self { sender, receiver, iv, ciphertext }
    }
}

/// Result of a successful re-encryption.
#[derive(Debug, Clone)]
pub struct Reencrypted {
    /// IV chosen for the outbound ciphertext
    pub iv: Iv,
    /// Ciphertext under the receiver's key
    pub ciphertext: Vec<u8>,
    /// Per-stage timings
    pub timings: StageTimings,
}

/// Re-encrypts messages between endpoint keys.
///
/// Cheap to share by reference across threads: the cache is internally
/// locked and each call builds its own cipher session.
pub struct ReencryptionPipeline<S, E> {
    cache: SharedKeyCache,
    store: S,
    env: E,
    config: RelayConfig,
    observer: Option<Arc<dyn StageObserver>>,
}

impl<S: SecureKeyStore, E: Environment> ReencryptionPipeline<S, E> {
    /// Build a pipeline with a fresh cache sized from `config`.
    pub fn new(config: RelayConfig, store: S, env: E) -> Result<Self, Error> {
        config.validate()?;
        let cache = SharedKeyCache::new(config.cache_capacity)?;

        if matches!(config.iv_policy, IvPolicy::Fixed(_)) {
            warn!("fixed IV policy in use, outbound IVs repeat across messages");
        }

        Ok(Self { cache, store, env, config, observer: None })
    }

    /// Use `cache` instead of the pipeline's own, so several pipelines can
    /// share one set of resident keys.
    #[must_use]
    pub fn with_cache(mut self, cache: SharedKeyCache) -> Self {
        self.cache = cache;
        self
    }

    /// Report each completed stage to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The key cache.
    pub fn cache(&self) -> &SharedKeyCache {
        &self.cache
    }

    /// The backing key store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Active configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Re-encrypt `message` from the sender's key to the receiver's key.
    ///
    /// Either returns the complete new IV and ciphertext, or an error naming
    /// the stage that failed. No partial output is produced.
    pub fn reencrypt(&self, message: &Message<'_>) -> Result<Reencrypted, PipelineError> {
        let mut session = CipherSession::new();
        let result = self.run(&mut session, message);
        session.close();

        if let Err(err) = &result {
            warn!(
                sender = %message.sender,
                receiver = %message.receiver,
                stage = %err.stage,
                error = %err.source,
                "re-encryption aborted"
            );
        }
        result
    }

    fn run(
        &self,
        session: &mut CipherSession,
        message: &Message<'_>,
    ) -> Result<Reencrypted, PipelineError> {
        let mut timings = StageTimings::default();

        let start = self.env.now();
        let (sender_key, outcome) = self
            .resolve_key(&message.sender)
            .map_err(|err| PipelineError::new(Stage::SenderKey, err))?;
        self.finish_stage(&mut timings, Stage::SenderKey, start, Some(outcome));

        let start = self.env.now();
        let plaintext =
            apply(session, Direction::Decrypt, &sender_key, message.iv, message.ciphertext)
                .map_err(|err| PipelineError::new(Stage::Decrypt, err))?;
        drop(sender_key);
        self.finish_stage(&mut timings, Stage::Decrypt, start, None);

        let start = self.env.now();
        let (receiver_key, outcome) = self
            .resolve_key(&message.receiver)
            .map_err(|err| PipelineError::new(Stage::ReceiverKey, err))?;
        self.finish_stage(&mut timings, Stage::ReceiverKey, start, Some(outcome));

        let start = self.env.now();
        let iv = self.next_iv();
        let mut ciphertext =
            apply(session, Direction::Encrypt, &receiver_key, iv.as_bytes(), &plaintext)
                .map_err(|err| PipelineError::new(Stage::Encrypt, err))?;
        drop(receiver_key);
        drop(plaintext);
        self.finish_stage(&mut timings, Stage::Encrypt, start, None);

        debug!(
            sender = %message.sender,
            receiver = %message.receiver,
            bytes = ciphertext.len(),
            timings = %timings,
            "re-encrypted message"
        );

        Ok(Reencrypted { iv, ciphertext: std::mem::take(&mut *ciphertext), timings })
    }

    fn resolve_key(
        &self,
        id: &EndpointId,
    ) -> Result<(KeyMaterial, CacheOutcome), Error> {
        let loader = KeyLoader::new(&self.store, &self.env, self.config.not_found_policy);
        self.cache.lookup_or_load(id, |id| loader.load(id).map_err(Error::from))
    }

    fn next_iv(&self) -> Iv {
        match self.config.iv_policy {
            IvPolicy::Random => self.env.random_iv(),
            IvPolicy::Fixed(bytes) => Iv::from_bytes(bytes),
        }
    }

    fn finish_stage(
        &self,
        timings: &mut StageTimings,
        stage: Stage,
        start: E::Instant,
        cache: Option<CacheOutcome>,
    ) {
        let timing = StageTiming { elapsed: self.env.elapsed_since(start), cache };
        timings.record(stage, timing);

        debug!(
            %stage,
            elapsed_us = timing.elapsed.as_micros() as u64,
            cache = ?timing.cache,
            "stage complete"
        );
        if let Some(observer) = &self.observer {
            observer.on_stage(stage, &timing);
        }
    }
}

impl<S, E> fmt::Debug for ReencryptionPipeline<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReencryptionPipeline")
            .field("cache", &self.cache)
            .field("config", &self.config)
            .field("observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

/// Configure `session` for one direction and run `input` through it.
fn apply(
    session: &mut CipherSession,
    direction: Direction,
    key: &KeyMaterial,
    iv: &[u8],
    input: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CipherError> {
    session.configure(direction, key)?;
    session.set_iv(iv)?;
    session.transform(input)
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Mutex,
            atomic::{AtomicU64, Ordering},
        },
        time::Duration,
    };

    use sealcache_crypto::{IV_SIZE, KEY_SIZE};

    use super::*;
    use crate::{
        config::NotFoundPolicy,
        error::ErrorCategory,
        store::{MemoryKeyStore, StoreError},
    };

    /// Clock advancing 1ms per reading; RNG counting up from a seed byte.
    #[derive(Clone)]
    struct StepEnv {
        ticks: Arc<AtomicU64>,
        next_byte: Arc<AtomicU64>,
    }

    impl StepEnv {
        fn new() -> Self {
            Self { ticks: Arc::new(AtomicU64::new(0)), next_byte: Arc::new(AtomicU64::new(1)) }
        }
    }

    impl Environment for StepEnv {
        type Instant = Duration;

        fn now(&self) -> Duration {
            Duration::from_millis(self.ticks.fetch_add(1, Ordering::SeqCst))
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            for byte in buffer {
                *byte = self.next_byte.fetch_add(1, Ordering::SeqCst) as u8;
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        stages: Mutex<Vec<Stage>>,
    }

    impl StageObserver for Recorder {
        fn on_stage(&self, stage: Stage, _timing: &StageTiming) {
            self.stages.lock().unwrap().push(stage);
        }
    }

    fn id(s: &str) -> EndpointId {
        s.parse().unwrap()
    }

    fn encrypt(key: &KeyMaterial, iv: &[u8], plaintext: &[u8]) -> Vec<u8> {
        let mut session = CipherSession::new();
        apply(&mut session, Direction::Encrypt, key, iv, plaintext).unwrap().to_vec()
    }

    fn decrypt(key: &KeyMaterial, iv: &[u8], ciphertext: &[u8]) -> Vec<u8> {
        let mut session = CipherSession::new();
        apply(&mut session, Direction::Decrypt, key, iv, ciphertext).unwrap().to_vec()
    }

    fn provisioned_store() -> (MemoryKeyStore, KeyMaterial, KeyMaterial) {
        let store = MemoryKeyStore::new();
        let k1 = KeyMaterial::from_bytes([0x11; KEY_SIZE]);
        let k2 = KeyMaterial::from_bytes([0x22; KEY_SIZE]);
        store.put(&id("alice"), &k1).unwrap();
        store.put(&id("bob"), &k2).unwrap();
        (store, k1, k2)
    }

    #[test]
    fn round_trip_to_receiver_key() {
        let (store, k1, k2) = provisioned_store();
        let pipeline =
            ReencryptionPipeline::new(RelayConfig::default(), store, StepEnv::new()).unwrap();

        let iv = [0x42; IV_SIZE];
        let plaintext = b"sixteen byte msgand another one!";
        let ciphertext = encrypt(&k1, &iv, plaintext);

        let out =
            pipeline.reencrypt(&Message::new(id("alice"), id("bob"), &iv, &ciphertext)).unwrap();

        assert_ne!(out.ciphertext, ciphertext);
        assert_eq!(decrypt(&k2, out.iv.as_bytes(), &out.ciphertext), plaintext);
    }

    #[test]
    fn timings_cover_every_stage() {
        let (store, k1, _) = provisioned_store();
        let pipeline =
            ReencryptionPipeline::new(RelayConfig::default(), store, StepEnv::new()).unwrap();
        let iv = [0; IV_SIZE];
        let ciphertext = encrypt(&k1, &iv, &[0; 16]);
        let message = Message::new(id("alice"), id("bob"), &iv, &ciphertext);

        let first = pipeline.reencrypt(&message).unwrap().timings;
        assert_eq!(first.to_string(), "1.000,1.000,1.000,1.000");
        assert_eq!(first.get(Stage::SenderKey).cache, Some(CacheOutcome::Miss));
        assert_eq!(first.get(Stage::Decrypt).cache, None);

        let second = pipeline.reencrypt(&message).unwrap().timings;
        assert_eq!(second.get(Stage::SenderKey).cache, Some(CacheOutcome::Hit));
        assert_eq!(second.get(Stage::ReceiverKey).cache, Some(CacheOutcome::Hit));
        assert_eq!(pipeline.store().get_count(), 2);
    }

    #[test]
    fn observer_sees_stages_in_order() {
        let (store, k1, _) = provisioned_store();
        let recorder = Arc::new(Recorder::default());
        let pipeline = ReencryptionPipeline::new(RelayConfig::default(), store, StepEnv::new())
            .unwrap()
            .with_observer(recorder.clone());
        let iv = [0; IV_SIZE];
        let ciphertext = encrypt(&k1, &iv, &[0; 32]);

        pipeline.reencrypt(&Message::new(id("alice"), id("bob"), &iv, &ciphertext)).unwrap();

        assert_eq!(*recorder.stages.lock().unwrap(), Stage::ALL.to_vec());
    }

    #[test]
    fn fixed_iv_policy_uses_configured_iv() {
        let (store, k1, _) = provisioned_store();
        let config =
            RelayConfig { iv_policy: IvPolicy::Fixed([9; IV_SIZE]), ..RelayConfig::default() };
        let pipeline = ReencryptionPipeline::new(config, store, StepEnv::new()).unwrap();
        let iv = [0; IV_SIZE];
        let ciphertext = encrypt(&k1, &iv, &[0; 16]);

        let out =
            pipeline.reencrypt(&Message::new(id("alice"), id("bob"), &iv, &ciphertext)).unwrap();
        assert_eq!(out.iv.as_bytes(), &[9; IV_SIZE]);
    }

    #[test]
    fn random_iv_differs_per_message() {
        let (store, k1, _) = provisioned_store();
        let pipeline =
            ReencryptionPipeline::new(RelayConfig::default(), store, StepEnv::new()).unwrap();
        let iv = [0; IV_SIZE];
        let ciphertext = encrypt(&k1, &iv, &[0; 16]);
        let message = Message::new(id("alice"), id("bob"), &iv, &ciphertext);

        let a = pipeline.reencrypt(&message).unwrap();
        let b = pipeline.reencrypt(&message).unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn missing_sender_under_fail_policy_reports_sender_stage() {
        let store = MemoryKeyStore::new();
        let config =
            RelayConfig { not_found_policy: NotFoundPolicy::Fail, ..RelayConfig::default() };
        let pipeline = ReencryptionPipeline::new(config, store, StepEnv::new()).unwrap();

        let err = pipeline
            .reencrypt(&Message::new(id("ghost"), id("bob"), &[0; IV_SIZE], &[0; 16]))
            .unwrap_err();

        assert_eq!(err.stage, Stage::SenderKey);
        assert_eq!(err.source, Error::Store(StoreError::NotFound(id("ghost"))));
        assert_eq!(err.category(), ErrorCategory::Store);
        assert_eq!(pipeline.cache().len().unwrap(), 0);
    }

    #[test]
    fn synthesize_policy_persists_new_keys() {
        let store = MemoryKeyStore::new();
        let pipeline =
            ReencryptionPipeline::new(RelayConfig::default(), store, StepEnv::new()).unwrap();

        pipeline
            .reencrypt(&Message::new(id("new-a"), id("new-b"), &[0; IV_SIZE], &[0; 16]))
            .unwrap();

        assert_eq!(pipeline.store().len().unwrap(), 2);
        assert_eq!(pipeline.cache().len().unwrap(), 2);
    }

    #[test]
    fn misaligned_ciphertext_fails_in_decrypt() {
        let (store, ..) = provisioned_store();
        let pipeline =
            ReencryptionPipeline::new(RelayConfig::default(), store, StepEnv::new()).unwrap();

        let err = pipeline
            .reencrypt(&Message::new(id("alice"), id("bob"), &[0; IV_SIZE], &[0; 15]))
            .unwrap_err();

        assert_eq!(err.stage, Stage::Decrypt);
        assert_eq!(err.category(), ErrorCategory::Transform);
        assert!(!pipeline.cache().contains(&id("bob")).unwrap());
    }

    #[test]
    fn short_iv_is_configuration_error() {
        let (store, ..) = provisioned_store();
        let pipeline =
            ReencryptionPipeline::new(RelayConfig::default(), store, StepEnv::new()).unwrap();

        let err = pipeline
            .reencrypt(&Message::new(id("alice"), id("bob"), &[0; 8], &[0; 16]))
            .unwrap_err();

        assert_eq!(err.stage, Stage::Decrypt);
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn missing_receiver_reports_receiver_stage() {
        let (store, k1, _) = provisioned_store();
        let config =
            RelayConfig { not_found_policy: NotFoundPolicy::Fail, ..RelayConfig::default() };
        let pipeline = ReencryptionPipeline::new(config, store, StepEnv::new()).unwrap();
        let iv = [0; IV_SIZE];
        let ciphertext = encrypt(&k1, &iv, &[0; 16]);

        let err = pipeline
            .reencrypt(&Message::new(id("alice"), id("nobody"), &iv, &ciphertext))
            .unwrap_err();

        assert_eq!(err.stage, Stage::ReceiverKey);
        assert_eq!(
            err.to_string(),
            "receiver_key stage failed: store error: no key stored for endpoint nobody"
        );
    }

    #[test]
    fn zero_capacity_rejected() {
        let config = RelayConfig { cache_capacity: 0, ..RelayConfig::default() };
        let err =
            ReencryptionPipeline::new(config, MemoryKeyStore::new(), StepEnv::new()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn shared_cache_across_pipelines() {
        let (store, k1, _) = provisioned_store();
        let cache = SharedKeyCache::new(8).unwrap();
        let a = ReencryptionPipeline::new(RelayConfig::default(), store.clone(), StepEnv::new())
            .unwrap()
            .with_cache(cache.clone());
        let b = ReencryptionPipeline::new(RelayConfig::default(), store, StepEnv::new())
            .unwrap()
            .with_cache(cache);
        let iv = [0; IV_SIZE];
        let ciphertext = encrypt(&k1, &iv, &[0; 16]);
        let message = Message::new(id("alice"), id("bob"), &iv, &ciphertext);

        a.reencrypt(&message).unwrap();
        let out = b.reencrypt(&message).unwrap();

        assert_eq!(out.timings.cache_hits(), 2);
    }
}
