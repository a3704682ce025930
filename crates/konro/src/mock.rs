//! Deterministic collaborators for tests and local serving.
//!
//! [`MockTokenizer`] treats token ids as Unicode codepoints and
//! [`MockEngine`] derives each generated token from its sequence's first
//! input token, so a given prompt always yields the same fragments. That
//! determinism is what the regression tests pin their golden outputs to.

use crate::config::SamplingParams;
use crate::error::GenerationError;
use crate::model::{GenerationEngine, Tokenizer};

/// Id used to pad shorter sequences to the common batch length.
pub const PAD_ID: u32 = 0;

/// Codepoint tokenizer: one token per character, zero-padded batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockTokenizer;

impl Tokenizer for MockTokenizer {
    fn encode_batch(&self, prompts: &[String]) -> Result<Vec<Vec<u32>>, GenerationError> {
        let mut encoded: Vec<Vec<u32>> = prompts
            .iter()
            .map(|prompt| prompt.chars().map(|c| c as u32).collect())
            .collect();

        let width = encoded.iter().map(Vec::len).max().unwrap_or(0);
        for ids in &mut encoded {
            ids.resize(width, PAD_ID);
        }
        Ok(encoded)
    }

    fn decode(&self, ids: &[u32]) -> Result<String, GenerationError> {
        ids.iter()
            .filter(|&&id| id != PAD_ID)
            .map(|&id| {
                char::from_u32(id)
                    .ok_or_else(|| GenerationError::Tokenizer(format!("invalid token id {id}")))
            })
            .collect()
    }
}

/// A generation engine with fixed, input-derived outputs.
///
/// For the sequence at batch index `i` with first non-pad input token
/// `seed`, decoding step `t` produces the single token `seed + t`. The
/// first callback echoes the padded inputs, as a real engine's streamer
/// would.
#[derive(Debug, Clone, Copy)]
pub struct MockEngine {
    steps: u32,
    fail_after: Option<u32>,
}

impl MockEngine {
    /// An engine that generates `steps` tokens per sequence (capped by
    /// `max_new_tokens`).
    pub fn new(steps: u32) -> Self {
        Self {
            steps,
            fail_after: None,
        }
    }

    /// Makes the engine fail after `steps` successful decoding steps.
    pub fn failing_after(mut self, steps: u32) -> Self {
        self.fail_after = Some(steps);
        self
    }
}

impl GenerationEngine for MockEngine {
    fn generate(
        &self,
        input_ids: Vec<Vec<u32>>,
        params: &SamplingParams,
        on_step: &mut dyn FnMut(Vec<Vec<u32>>),
    ) -> Result<Vec<Vec<u32>>, GenerationError> {
        let seeds: Vec<u32> = input_ids
            .iter()
            .map(|ids| {
                ids.iter()
                    .copied()
                    .find(|&id| id != PAD_ID)
                    .unwrap_or('a' as u32)
            })
            .collect();

        // Prompt echo: step 0 reflects the inputs, not new tokens.
        on_step(input_ids.clone());

        let mut generated: Vec<Vec<u32>> = vec![Vec::new(); input_ids.len()];
        let steps = self.steps.min(params.max_new_tokens);

        for t in 1..=steps {
            if self.fail_after.is_some_and(|limit| t > limit) {
                return Err(GenerationError::Engine(
                    "synthetic engine failure".to_string(),
                ));
            }

            let outputs: Vec<Vec<u32>> =
                seeds.iter().map(|&seed| vec![seed + t]).collect();
            for (seq, out) in generated.iter_mut().zip(&outputs) {
                seq.extend_from_slice(out);
            }
            on_step(outputs);
        }

        Ok(generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_pads_to_a_common_width() {
        let encoded = MockTokenizer
            .encode_batch(&["ab".to_string(), "wxyz".to_string()])
            .unwrap();
        assert_eq!(encoded[0].len(), 4);
        assert_eq!(encoded[1].len(), 4);
        assert_eq!(&encoded[0][2..], &[PAD_ID, PAD_ID]);
    }

    #[test]
    fn decode_is_deterministic_and_skips_padding() {
        let ids = vec!['h' as u32, 'i' as u32, PAD_ID];
        let once = MockTokenizer.decode(&ids).unwrap();
        let twice = MockTokenizer.decode(&ids).unwrap();
        assert_eq!(once, "hi");
        assert_eq!(once, twice);
    }

    #[test]
    fn decode_rejects_invalid_ids() {
        assert!(MockTokenizer.decode(&[0xD800]).is_err());
    }

    #[test]
    fn engine_output_is_a_pure_function_of_the_prompt() {
        let params = SamplingParams {
            max_new_tokens: 3,
            temperature: 1.0,
        };
        let input = MockTokenizer.encode_batch(&["ab".to_string()]).unwrap();

        let mut steps_a = vec![];
        let out_a = MockEngine::new(3)
            .generate(input.clone(), &params, &mut |s| steps_a.push(s))
            .unwrap();
        let mut steps_b = vec![];
        let out_b = MockEngine::new(3)
            .generate(input, &params, &mut |s| steps_b.push(s))
            .unwrap();

        assert_eq!(out_a, out_b);
        assert_eq!(steps_a, steps_b);
        // 'a' is 97: the golden continuation is "b", "c", "d".
        assert_eq!(out_a[0], vec![98, 99, 100]);
    }

    #[test]
    fn max_new_tokens_caps_the_step_count() {
        let params = SamplingParams {
            max_new_tokens: 2,
            temperature: 1.0,
        };
        let input = MockTokenizer.encode_batch(&["ab".to_string()]).unwrap();

        let mut step_count = 0;
        let generated = MockEngine::new(10)
            .generate(input, &params, &mut |_| step_count += 1)
            .unwrap();

        // Echo plus two decoding steps.
        assert_eq!(step_count, 3);
        assert_eq!(generated[0].len(), 2);
    }
}
