//! Configuration surface for the batching pipeline.
//!
//! The structs here are plain data with validated invariants; loading them
//! from files or the environment is the frontend's concern.

use std::time::Duration;

use crate::error::ConfigError;

/// Batch-closing policy for the admission controller.
///
/// A batch is open while `size < max_batch_size` and less than
/// `batch_wait_timeout` has elapsed since its first request arrived; it
/// closes as soon as either bound is hit. A small timeout favors latency,
/// a larger batch amortizes one generation call across more prompts.
///
/// Re-configuration takes effect for the next batch formed, never for an
/// already-open batch.
#[derive(Debug, Clone)]
pub struct BatchPolicy {
    /// Maximum number of requests per batch. Must be at least 1.
    pub max_batch_size: usize,

    /// Maximum time a batch stays open after its first request arrives.
    pub batch_wait_timeout: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            max_batch_size: 10,
            batch_wait_timeout: Duration::from_secs(1),
        }
    }
}

impl BatchPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        Ok(())
    }
}

/// Parameters passed through to the generation engine.
///
/// These are instance-level settings: every member of a batch shares them,
/// since the batch is served by a single generation call.
#[derive(Debug, Clone, Copy)]
pub struct SamplingParams {
    /// Maximum number of new tokens generated per sequence.
    pub max_new_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 128,
            temperature: 1.0,
        }
    }
}

/// Tuning knobs for the per-batch step bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Bounded channel capacity. A slow consumer makes the producer block
    /// once this many steps are buffered.
    pub capacity: usize,

    /// How long the consumer waits for the next step before presuming the
    /// worker dead and failing the batch.
    pub stall_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            capacity: 32,
            stall_timeout: Duration::from_secs(60),
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroBridgeCapacity);
        }
        Ok(())
    }
}

/// Complete configuration for a [`crate::BatchGenerator`].
#[derive(Debug, Clone, Default)]
pub struct GenerationConfig {
    pub policy: BatchPolicy,
    pub sampling: SamplingParams,
    pub bridge: BridgeConfig,
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.policy.validate()?;
        self.bridge.validate()?;
        Ok(())
    }
}
