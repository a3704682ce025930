//! Read-only throughput telemetry.
//!
//! Cumulative counters scoped to one generator instance, updated once per
//! completed batch from the worker thread and read from anywhere. Purely
//! observational: nothing in the pipeline branches on these values.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Cumulative counters for one generator instance.
#[derive(Debug, Default)]
pub struct Telemetry {
    batches: AtomicU64,
    requests: AtomicU64,
    tokens: AtomicU64,
    busy_micros: AtomicU64,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one successfully completed batch.
    ///
    /// `tokens` is the sum of generated sequence lengths across the
    /// batch; `elapsed` the wall-clock duration of the generation call.
    pub(crate) fn record_batch(&self, requests: usize, tokens: u64, elapsed: Duration) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.requests.fetch_add(requests as u64, Ordering::Relaxed);
        self.tokens.fetch_add(tokens, Ordering::Relaxed);
        self.busy_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Takes a consistent-enough point-in-time snapshot.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let batches = self.batches.load(Ordering::Relaxed);
        let requests = self.requests.load(Ordering::Relaxed);
        let tokens = self.tokens.load(Ordering::Relaxed);
        let busy_micros = self.busy_micros.load(Ordering::Relaxed);

        let busy_secs = busy_micros as f64 / 1e6;
        TelemetrySnapshot {
            batches,
            requests,
            generated_tokens: tokens,
            avg_tokens_per_sec: if busy_micros > 0 {
                tokens as f64 / busy_secs
            } else {
                0.0
            },
            avg_request_latency_secs: if requests > 0 {
                busy_secs / requests as f64
            } else {
                0.0
            },
        }
    }
}

/// Point-in-time view of a [`Telemetry`] instance.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TelemetrySnapshot {
    /// Completed batches.
    pub batches: u64,
    /// Requests served by completed batches.
    pub requests: u64,
    /// Total generated tokens across all completed batches.
    pub generated_tokens: u64,
    /// Generated tokens per second of generation wall time.
    pub avg_tokens_per_sec: f64,
    /// Generation wall time per request.
    pub avg_request_latency_secs: f64,
}
