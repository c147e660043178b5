//! Byte-level reencrypt command.
//!
//! The dispatch layer hands over two buffers: the request and the receiver
//! id. The request is laid out as
//!
//! ```text
//! +----------------------+-------------+---------------------------+
//! | sender id (12 bytes) | IV (16)     | ciphertext (n * 16 bytes) |
//! | NUL-padded           |             |                           |
//! +----------------------+-------------+---------------------------+
//! ```
//!
//! and the response written to the output buffer is `new IV || new
//! ciphertext`, always exactly `16 + n * 16` bytes. If the output buffer is
//! smaller the command fails with [`CommandError::ShortBuffer`] carrying the
//! required size, without touching either key or the cache.

use sealcache_crypto::{BLOCK_SIZE, CipherError, IV_SIZE, Iv};
use thiserror::Error;

use crate::{
    endpoint::{ENDPOINT_ID_SIZE, EndpointId},
    env::Environment,
    error::{Error, ErrorCategory, PipelineError},
    pipeline::{Message, ReencryptionPipeline, Stage, StageTimings},
    store::SecureKeyStore,
};

/// Bytes preceding the ciphertext in a request
pub const REQUEST_HEADER_SIZE: usize = ENDPOINT_ID_SIZE + IV_SIZE;

/// Error categories surfaced to the dispatch layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Malformed request or receiver buffer
    #[error("bad parameters: {0}")]
    BadParameters(String),

    /// Cipher or cache structures could not be allocated
    #[error("out of memory")]
    OutOfMemory,

    /// A pipeline stage failed
    #[error("{stage} stage failed ({category:?})")]
    GenericFailure {
        /// Stage that failed
        stage: Stage,
        /// Category of the underlying error
        category: ErrorCategory,
    },

    /// Output buffer too small; retry with at least `required` bytes
    #[error("output buffer too small, {required} bytes required")]
    ShortBuffer {
        /// Size the output buffer must have
        required: usize,
    },
}

impl From<PipelineError> for CommandError {
    fn from(err: PipelineError) -> Self {
        match &err.source {
            Error::Cipher(CipherError::Resource { .. }) => Self::OutOfMemory,
            source => Self::GenericFailure { stage: err.stage, category: source.category() },
        }
    }
}

/// Result of a successful command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutput {
    /// Bytes written to the output buffer
    pub written: usize,
    /// Per-stage timings, for benchmarking callers
    pub timings: StageTimings,
}

/// A parsed reencrypt request borrowing from the request buffer.
#[derive(Debug, Clone, Copy)]
pub struct ReencryptCommand<'a> {
    sender: EndpointId,
    receiver: EndpointId,
    iv: &'a [u8],
    ciphertext: &'a [u8],
}

impl<'a> ReencryptCommand<'a> {
    /// Parse a request and receiver id.
    pub fn parse(request: &'a [u8], receiver: &[u8]) -> Result<Self, CommandError> {
        if request.len() < REQUEST_HEADER_SIZE {
            return Err(CommandError::BadParameters(format!(
                "request is {} bytes, header alone is {REQUEST_HEADER_SIZE}",
                request.len()
            )));
        }

        let (sender, rest) = request.split_at(ENDPOINT_ID_SIZE);
        let (iv, ciphertext) = rest.split_at(IV_SIZE);

        if ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CommandError::BadParameters(format!(
                "ciphertext is {} bytes, not a multiple of {BLOCK_SIZE}",
                ciphertext.len()
            )));
        }

        let sender = EndpointId::from_wire(sender)
            .map_err(|err| CommandError::BadParameters(format!("sender: {err}")))?;
        let receiver = EndpointId::from_wire(receiver)
            .map_err(|err| CommandError::BadParameters(format!("receiver: {err}")))?;

        Ok(Self { sender, receiver, iv, ciphertext })
    }

    /// Sending endpoint.
    pub fn sender(&self) -> &EndpointId {
        &self.sender
    }

    /// Receiving endpoint.
    pub fn receiver(&self) -> &EndpointId {
        &self.receiver
    }

    /// Output buffer size this request needs.
    pub fn required_output_len(&self) -> usize {
        IV_SIZE + self.ciphertext.len()
    }

    /// View as a pipeline message.
    pub fn message(&self) -> Message<'a> {
        Message::new(self.sender, self.receiver, self.iv, self.ciphertext)
    }

    /// Run the request through `pipeline`, writing `new IV || new ciphertext`
    /// to the front of `output`.
    pub fn execute<S: SecureKeyStore, E: Environment>(
        &self,
        pipeline: &ReencryptionPipeline<S, E>,
        output: &mut [u8],
    ) -> Result<CommandOutput, CommandError> {
        let required = self.required_output_len();
        if output.len() < required {
            return Err(CommandError::ShortBuffer { required });
        }

        let result = pipeline.reencrypt(&self.message())?;

        let (iv_out, rest) = output.split_at_mut(IV_SIZE);
        iv_out.copy_from_slice(result.iv.as_bytes());
        rest[..result.ciphertext.len()].copy_from_slice(&result.ciphertext);

        Ok(CommandOutput { written: required, timings: result.timings })
    }
}

/// Build a request buffer for `sender`.
pub fn encode_request(sender: &EndpointId, iv: &Iv, ciphertext: &[u8]) -> Vec<u8> {
    let mut request = Vec::with_capacity(REQUEST_HEADER_SIZE + ciphertext.len());
    request.extend_from_slice(&sender.to_wire());
    request.extend_from_slice(iv.as_bytes());
    request.extend_from_slice(ciphertext);
    request
}
