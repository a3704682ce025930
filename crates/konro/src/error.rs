//! Error types for the batching pipeline.

use std::time::Duration;
use thiserror::Error;

/// Rejection of a request before it reaches a batch.
///
/// Admission errors are surfaced synchronously to the submitting caller;
/// a rejected request never occupies a batch slot.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The prompt was empty or whitespace-only.
    #[error("prompt must not be empty")]
    EmptyPrompt,

    /// The generator is shutting down and no longer accepts work.
    #[error("generator is shutting down")]
    Shutdown,
}

/// Failure of a generation job after its batch was formed.
///
/// One generation call serves every request in a batch, so a mid-batch
/// failure is delivered to every member's stream as its final item.
/// Output already streamed is not retracted.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// The generation engine collaborator failed.
    #[error("generation engine failed: {0}")]
    Engine(String),

    /// The tokenizer collaborator failed to encode or decode.
    #[error("tokenizer failed: {0}")]
    Tokenizer(String),

    /// A decoding step carried the wrong number of per-request outputs.
    ///
    /// Index-based routing relies on every step being aligned 1:1 with the
    /// batch, so a mismatch fails the whole batch rather than risk
    /// delivering fragments to the wrong caller.
    #[error("decoding step carried {got} outputs for a batch of {expected}")]
    ShapeMismatch { expected: usize, got: usize },

    /// No bridge event arrived within the stall ceiling.
    ///
    /// The worker is presumed dead and is not retried.
    #[error("no output from generation worker within {0:?}")]
    Stalled(Duration),

    /// The worker exited without delivering a terminal sentinel.
    #[error("generation worker exited without completing the batch")]
    WorkerExited,

    /// The generator shut down before the request's batch was formed.
    ///
    /// Delivered to every request still waiting when the admission loop
    /// exits, so no caller is left on a stream nobody will ever feed.
    #[error("generator shut down before the request was served")]
    Cancelled,
}

/// Invalid pipeline configuration, rejected before any work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_batch_size must be at least 1")]
    ZeroBatchSize,

    #[error("bridge capacity must be at least 1")]
    ZeroBridgeCapacity,
}
