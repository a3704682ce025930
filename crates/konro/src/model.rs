//! Collaborator traits for the external model stack.
//!
//! The pipeline treats the tokenizer and the generation engine as opaque
//! collaborators. Both are synchronous and may block: the pipeline only
//! ever invokes them from a dedicated worker thread, except for
//! [`Tokenizer::decode`] which must be cheap enough to run on the async
//! runtime while demultiplexing.

use crate::config::SamplingParams;
use crate::error::GenerationError;

/// Tokenizer collaborator: text to token ids and back.
pub trait Tokenizer: Send + Sync {
    /// Encodes a batch of prompts, padding every sequence to a common
    /// length. The returned outer vector is aligned 1:1 with `prompts`.
    fn encode_batch(&self, prompts: &[String]) -> Result<Vec<Vec<u32>>, GenerationError>;

    /// Decodes token ids into a text fragment.
    ///
    /// Must be deterministic: the same ids always produce the same text.
    fn decode(&self, ids: &[u32]) -> Result<String, GenerationError>;
}

/// Generation engine collaborator: one blocking, multi-prompt call.
pub trait GenerationEngine: Send + Sync {
    /// Runs generation for a batch of padded input sequences.
    ///
    /// `on_step` is invoked once per decoding step with one output per
    /// input sequence, in input order. The first invocation echoes the
    /// padded inputs (the prompt-echo step); every later invocation
    /// carries the newly generated ids for that step.
    ///
    /// Returns the generated (non-prompt) ids per sequence. The call
    /// blocks until generation completes: `max_new_tokens` reached or a
    /// natural stop condition for every sequence.
    fn generate(
        &self,
        input_ids: Vec<Vec<u32>>,
        params: &SamplingParams,
        on_step: &mut dyn FnMut(Vec<Vec<u32>>),
    ) -> Result<Vec<Vec<u32>>, GenerationError>;
}
