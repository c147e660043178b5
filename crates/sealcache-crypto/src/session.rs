//! Block-cipher session state machine
//!
//! Wraps AES-256-CBC without padding. The session owns a copy of the key for
//! as long as it is configured, and every transition out of a keyed state
//! drops that copy (and the expanded cipher state), which zeroizes it.

use std::fmt;

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, generic_array::GenericArray};
use zeroize::Zeroizing;

use crate::{
    error::CipherError,
    key::{BLOCK_SIZE, Iv, KeyMaterial},
};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Whether the session encrypts or decrypts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Plaintext in, ciphertext out
    Encrypt,
    /// Ciphertext in, plaintext out
    Decrypt,
}

/// Observable lifecycle state of a [`CipherSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No key loaded yet
    Uninitialized,
    /// Key and direction set, waiting for an IV
    Configured,
    /// Ready to transform data
    Active,
    /// Terminal; all key material released
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Configured => "configured",
            Self::Active => "active",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Keyed cipher state for one direction.
enum Engine {
    Encrypt(Aes256CbcEnc),
    Decrypt(Aes256CbcDec),
}

impl Engine {
    fn new(direction: Direction, key: &KeyMaterial, iv: &Iv) -> Self {
        let key = GenericArray::from_slice(key.expose());
        let iv = GenericArray::from_slice(iv.as_bytes());

        match direction {
            Direction::Encrypt => Self::Encrypt(Aes256CbcEnc::new(key, iv)),
            Direction::Decrypt => Self::Decrypt(Aes256CbcDec::new(key, iv)),
        }
    }

    /// Run the cipher over `buf` in place. `buf` must be block-aligned.
    fn apply(&mut self, buf: &mut [u8]) {
        debug_assert_eq!(buf.len() % BLOCK_SIZE, 0);

        for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
            let block = GenericArray::from_mut_slice(chunk);
            match self {
                Self::Encrypt(enc) => enc.encrypt_block_mut(block),
                Self::Decrypt(dec) => dec.decrypt_block_mut(block),
            }
        }
    }
}

enum Stage {
    Uninitialized,
    Configured { direction: Direction, key: KeyMaterial },
    Active { direction: Direction, key: KeyMaterial, engine: Engine },
    Closed,
}

impl Stage {
    fn state(&self) -> SessionState {
        match self {
            Self::Uninitialized => SessionState::Uninitialized,
            Self::Configured { .. } => SessionState::Configured,
            Self::Active { .. } => SessionState::Active,
            Self::Closed => SessionState::Closed,
        }
    }
}

/// Cipher session owned by exactly one re-encryption at a time.
///
/// Not `Clone`: the session holds secret key state and must have a single
/// owner. Concurrent re-encryptions each create their own session.
///
/// Dropping the session closes it, so key material is released on every exit
/// path including early returns and unwinding.
pub struct CipherSession {
    stage: Stage,
}

impl CipherSession {
    /// Create an uninitialized session.
    pub fn new() -> Self {
        Self { stage: Stage::Uninitialized }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.stage.state()
    }

    /// Direction of the loaded key, if any.
    pub fn direction(&self) -> Option<Direction> {
        match &self.stage {
            Stage::Configured { direction, .. } | Stage::Active { direction, .. } => {
                Some(*direction)
            },
            Stage::Uninitialized | Stage::Closed => None,
        }
    }

    /// True while the session holds a key.
    pub fn has_key_material(&self) -> bool {
        matches!(self.stage, Stage::Configured { .. } | Stage::Active { .. })
    }

    /// Load a key and direction.
    ///
    /// Re-entrant: configuring a `Configured` or `Active` session first
    /// releases the previous key and cipher state. Fails only on a closed
    /// session.
    pub fn configure(
        &mut self,
        direction: Direction,
        key: &KeyMaterial,
    ) -> Result<(), CipherError> {
        if matches!(self.stage, Stage::Closed) {
            return Err(CipherError::Ordering {
                operation: "configure",
                state: SessionState::Closed,
            });
        }

        self.release();
        self.stage = Stage::Configured { direction, key: key.clone() };

        Ok(())
    }

    /// Set the IV and start a fresh CBC chain.
    ///
    /// Transitions `Configured -> Active`. Setting a new IV on an `Active`
    /// session restarts the chain under the same key.
    ///
    /// # Errors
    ///
    /// - `Ordering`: no key has been configured, or the session is closed
    /// - `InvalidIvLength`: `iv` is not exactly [`crate::IV_SIZE`] bytes
    pub fn set_iv(&mut self, iv: &[u8]) -> Result<(), CipherError> {
        if !matches!(self.stage, Stage::Configured { .. } | Stage::Active { .. }) {
            return Err(CipherError::Ordering { operation: "set_iv", state: self.state() });
        }

        let iv = Iv::from_slice(iv)?;

        let (direction, key) = match std::mem::replace(&mut self.stage, Stage::Uninitialized) {
            Stage::Configured { direction, key } | Stage::Active { direction, key, .. } => {
                (direction, key)
            },
            other => {
                let state = other.state();
                self.stage = other;
                return Err(CipherError::Ordering { operation: "set_iv", state });
            },
        };

        let engine = Engine::new(direction, &key, &iv);
        self.stage = Stage::Active { direction, key, engine };

        Ok(())
    }

    /// Transform `input` into a newly allocated buffer.
    ///
    /// One cipher update: successive calls continue the same CBC chain. The
    /// session stays `Active`. The output is zeroized when dropped since it
    /// may hold plaintext.
    ///
    /// # Errors
    ///
    /// - `Ordering`: session is not `Active`
    /// - `MisalignedInput`: `input` is not a whole number of blocks
    /// - `Resource`: the output buffer could not be allocated
    pub fn transform(&mut self, input: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError> {
        let engine = self.active_engine("transform")?;
        check_alignment(input)?;

        let mut output = Zeroizing::new(Vec::new());
        output
            .try_reserve_exact(input.len())
            .map_err(|_| CipherError::Resource { requested: input.len() })?;
        output.extend_from_slice(input);

        engine.apply(&mut output);

        Ok(output)
    }

    /// Transform `input` into the front of `output`, returning bytes written.
    ///
    /// # Errors
    ///
    /// As [`Self::transform`], plus `ShortBuffer` when `output` is smaller
    /// than `input`.
    pub fn transform_into(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CipherError> {
        let engine = self.active_engine("transform")?;
        check_alignment(input)?;

        if output.len() < input.len() {
            return Err(CipherError::ShortBuffer { required: input.len(), actual: output.len() });
        }

        let out = &mut output[..input.len()];
        out.copy_from_slice(input);
        engine.apply(out);

        Ok(input.len())
    }

    /// Release all key material and enter the terminal `Closed` state.
    ///
    /// Idempotent.
    pub fn close(&mut self) {
        self.release();
        self.stage = Stage::Closed;
    }

    /// Drop any key and cipher state, keeping `Closed` terminal.
    fn release(&mut self) {
        if !matches!(self.stage, Stage::Closed) {
            // Dropping the old stage zeroizes the key copy and round keys
            self.stage = Stage::Uninitialized;
        }
    }

    fn active_engine(&mut self, operation: &'static str) -> Result<&mut Engine, CipherError> {
        let state = self.state();
        match &mut self.stage {
            Stage::Active { engine, .. } => Ok(engine),
            _ => Err(CipherError::Ordering { operation, state }),
        }
    }
}

impl Default for CipherSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CipherSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for CipherSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherSession")
            .field("state", &self.state())
            .field("direction", &self.direction())
            .finish_non_exhaustive()
    }
}

fn check_alignment(input: &[u8]) -> Result<(), CipherError> {
    if input.len() % BLOCK_SIZE != 0 {
        return Err(CipherError::MisalignedInput { len: input.len(), block_size: BLOCK_SIZE });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{IV_SIZE, KEY_SIZE};

    // NIST SP 800-38A, F.2.5 CBC-AES256.Encrypt
    const NIST_KEY: &str = "603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4";
    const NIST_IV: &str = "000102030405060708090a0b0c0d0e0f";
    const NIST_PLAINTEXT: &str = concat!(
        "6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51",
        "30c81c46a35ce411e5fbc1191a0a52eff69f2445df4f9b17ad2b417be66c3710",
    );
    const NIST_CIPHERTEXT: &str = concat!(
        "f58c4c04d6e5f1ba779eabfb5f7bfbd69cfc4e967edb808d679f777bc6702c7d",
        "39f23369a9d9bacfa530e26304231461b2eb05e2c39be9fcda6c19078c6a9d1b",
    );

    fn nist_key() -> KeyMaterial {
        KeyMaterial::from_slice(&hex::decode(NIST_KEY).unwrap()).unwrap()
    }

    fn active_session(direction: Direction) -> CipherSession {
        let mut session = CipherSession::new();
        session.configure(direction, &nist_key()).unwrap();
        session.set_iv(&hex::decode(NIST_IV).unwrap()).unwrap();
        session
    }

    #[test]
    fn encrypt_matches_nist_vector() {
        let mut session = active_session(Direction::Encrypt);
        let ciphertext = session.transform(&hex::decode(NIST_PLAINTEXT).unwrap()).unwrap();
        assert_eq!(hex::encode(&*ciphertext), NIST_CIPHERTEXT);
    }

    #[test]
    fn decrypt_matches_nist_vector() {
        let mut session = active_session(Direction::Decrypt);
        let plaintext = session.transform(&hex::decode(NIST_CIPHERTEXT).unwrap()).unwrap();
        assert_eq!(hex::encode(&*plaintext), NIST_PLAINTEXT);
    }

    #[test]
    fn successive_updates_continue_the_chain() {
        let plaintext = hex::decode(NIST_PLAINTEXT).unwrap();
        let mut session = active_session(Direction::Encrypt);

        let first = session.transform(&plaintext[..32]).unwrap();
        let second = session.transform(&plaintext[32..]).unwrap();

        let mut joined = first.to_vec();
        joined.extend_from_slice(&second);
        assert_eq!(hex::encode(joined), NIST_CIPHERTEXT);
    }

    #[test]
    fn state_transitions() {
        let mut session = CipherSession::new();
        assert_eq!(session.state(), SessionState::Uninitialized);

        session.configure(Direction::Encrypt, &nist_key()).unwrap();
        assert_eq!(session.state(), SessionState::Configured);
        assert_eq!(session.direction(), Some(Direction::Encrypt));

        session.set_iv(&[0u8; IV_SIZE]).unwrap();
        assert_eq!(session.state(), SessionState::Active);

        session.transform(&[0u8; BLOCK_SIZE]).unwrap();
        assert_eq!(session.state(), SessionState::Active);

        session.configure(Direction::Decrypt, &nist_key()).unwrap();
        assert_eq!(session.state(), SessionState::Configured);
        assert_eq!(session.direction(), Some(Direction::Decrypt));

        session.close();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn set_iv_before_configure_is_ordering_error() {
        let mut session = CipherSession::new();
        let result = session.set_iv(&[0u8; IV_SIZE]);

        assert_eq!(
            result,
            Err(CipherError::Ordering {
                operation: "set_iv",
                state: SessionState::Uninitialized
            })
        );
    }

    #[test]
    fn transform_before_set_iv_is_ordering_error() {
        let mut session = CipherSession::new();
        session.configure(Direction::Encrypt, &nist_key()).unwrap();

        let result = session.transform(&[0u8; BLOCK_SIZE]);
        assert!(matches!(
            result,
            Err(CipherError::Ordering { operation: "transform", state: SessionState::Configured })
        ));
    }

    #[test]
    fn wrong_iv_length_is_rejected_and_state_kept() {
        let mut session = CipherSession::new();
        session.configure(Direction::Encrypt, &nist_key()).unwrap();

        let result = session.set_iv(&[0u8; IV_SIZE - 1]);
        assert_eq!(result, Err(CipherError::InvalidIvLength { expected: IV_SIZE, actual: 15 }));
        assert_eq!(session.state(), SessionState::Configured);
    }

    #[test]
    fn misaligned_input_is_rejected() {
        let mut session = active_session(Direction::Encrypt);
        let result = session.transform(&[0u8; BLOCK_SIZE + 1]);

        assert!(matches!(
            result,
            Err(CipherError::MisalignedInput { len: 17, block_size: BLOCK_SIZE })
        ));
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn transform_into_checks_output_size() {
        let mut session = active_session(Direction::Encrypt);
        let mut output = [0u8; BLOCK_SIZE];

        let result = session.transform_into(&[0u8; 2 * BLOCK_SIZE], &mut output);
        assert_eq!(result, Err(CipherError::ShortBuffer { required: 32, actual: 16 }));
    }

    #[test]
    fn transform_into_matches_transform() {
        let plaintext = hex::decode(NIST_PLAINTEXT).unwrap();

        let mut output = vec![0u8; plaintext.len() + BLOCK_SIZE];
        let written =
            active_session(Direction::Encrypt).transform_into(&plaintext, &mut output).unwrap();

        assert_eq!(written, plaintext.len());
        assert_eq!(hex::encode(&output[..written]), NIST_CIPHERTEXT);
    }

    #[test]
    fn empty_input_is_aligned() {
        let mut session = active_session(Direction::Decrypt);
        assert!(session.transform(&[]).unwrap().is_empty());
    }

    #[test]
    fn close_is_idempotent_and_releases_key() {
        let mut session = active_session(Direction::Encrypt);
        assert!(session.has_key_material());

        session.close();
        assert!(!session.has_key_material());
        assert_eq!(session.direction(), None);

        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.has_key_material());
    }

    #[test]
    fn closed_session_rejects_everything() {
        let mut session = active_session(Direction::Encrypt);
        session.close();

        let key = KeyMaterial::from_bytes([1u8; KEY_SIZE]);
        assert!(matches!(
            session.configure(Direction::Encrypt, &key),
            Err(CipherError::Ordering { state: SessionState::Closed, .. })
        ));
        assert!(matches!(
            session.set_iv(&[0u8; IV_SIZE]),
            Err(CipherError::Ordering { state: SessionState::Closed, .. })
        ));
        assert!(matches!(
            session.transform(&[0u8; BLOCK_SIZE]),
            Err(CipherError::Ordering { state: SessionState::Closed, .. })
        ));
    }

    #[test]
    fn debug_does_not_print_key() {
        let session = active_session(Direction::Encrypt);
        let printed = format!("{session:?}");
        assert!(!printed.contains("603deb"));
        assert!(printed.contains("Active"));
    }
}
