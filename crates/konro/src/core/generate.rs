//! The blocking generation worker.
//!
//! One invocation serves one batch. It runs on a blocking thread (never
//! the async runtime), performs the single generation call for the whole
//! batch, and reports every decoding step through the bridge.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::batch::DecodingStep;
use crate::communication::StepSender;
use crate::config::SamplingParams;
use crate::model::{GenerationEngine, Tokenizer};
use crate::telemetry::Telemetry;

pub(crate) fn generate_batch(
    tokenizer: Arc<dyn Tokenizer>,
    engine: Arc<dyn GenerationEngine>,
    prompts: Vec<String>,
    sampling: SamplingParams,
    steps: StepSender,
    telemetry: Arc<Telemetry>,
) {
    let input_ids = match tokenizer.encode_batch(&prompts) {
        Ok(ids) => ids,
        Err(error) => {
            warn!(error = %error, "failed to encode batch");
            steps.fail(error);
            return;
        }
    };
    debug_assert_eq!(input_ids.len(), prompts.len());

    let mut next_index = 0u64;
    let mut bridge_open = true;

    let started = Instant::now();
    let result = engine.generate(input_ids, &sampling, &mut |outputs| {
        if !bridge_open {
            return;
        }
        let step = DecodingStep::new(next_index, outputs);
        next_index += 1;
        // A closed bridge means the batch was torn down on the consumer
        // side. The shared call runs to completion regardless; only the
        // reporting stops.
        if steps.put(step).is_err() {
            bridge_open = false;
        }
    });
    let elapsed = started.elapsed();

    match result {
        Ok(sequences) => {
            let tokens: u64 = sequences.iter().map(|seq| seq.len() as u64).sum();
            telemetry.record_batch(prompts.len(), tokens, elapsed);

            let snapshot = telemetry.snapshot();
            info!(
                batch_size = prompts.len(),
                tokens,
                elapsed_ms = elapsed.as_millis() as u64,
                tokens_per_sec = tokens as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
                avg_tokens_per_sec = snapshot.avg_tokens_per_sec,
                avg_request_latency_secs = snapshot.avg_request_latency_secs,
                "batch generation complete"
            );
            steps.end();
        }
        Err(error) => {
            warn!(error = %error, "generation engine failed mid-batch");
            steps.fail(error);
        }
    }
}
