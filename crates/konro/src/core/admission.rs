//! Batch admission: the background loop that turns a shared waiting
//! queue into closed batches and drives each batch through generation.
//!
//! Exactly one generation job is in flight at a time: the loop awaits a
//! batch's completion before forming the next one. Horizontal scaling is
//! a replication concern, not internal parallelism.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::error::Elapsed;
use tracing::{info, warn};

use crate::batch::{Batch, CloseReason, Request};
use crate::communication::step_bridge;
use crate::config::{BatchPolicy, BridgeConfig, SamplingParams};
use crate::core::demux::{self, PumpOutcome};
use crate::core::generate;
use crate::error::GenerationError;
use crate::model::{GenerationEngine, Tokenizer};
use crate::telemetry::Telemetry;

/// Everything the admission loop needs besides the queue itself.
pub(crate) struct PipelineContext {
    pub tokenizer: Arc<dyn Tokenizer>,
    pub engine: Arc<dyn GenerationEngine>,
    pub policy: Arc<Mutex<BatchPolicy>>,
    pub sampling: SamplingParams,
    pub bridge: BridgeConfig,
    pub telemetry: Arc<Telemetry>,
}

pub(crate) async fn admission_loop(
    ctx: PipelineContext,
    running: Arc<AtomicBool>,
    notifier: Arc<Notify>,
    waiting: Arc<Mutex<Vec<Request>>>,
) {
    loop {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        if waiting.lock().await.is_empty() {
            // Idle: wait for a submission, then loop back so the running
            // flag is re-checked before any batch is opened.
            let _ = timeout_await_notifier(&notifier).await;
            continue;
        }

        // Snapshot the policy: re-configuration applies to the next batch,
        // never retroactively to this one.
        let policy = ctx.policy.lock().await.clone();
        let Some(batch) = form_batch(&policy, &waiting, &notifier, &running).await else {
            continue;
        };

        info!(
            size = batch.len(),
            reason = batch.reason().as_str(),
            "batch closed"
        );
        run_batch(&ctx, batch).await;
    }

    dispose_waiting(&waiting).await;
}

/// Fails every request still waiting when the loop exits.
///
/// A stream that would otherwise never be fed instead carries one failure
/// marker and closes, so shutdown is observable from every caller.
async fn dispose_waiting(waiting: &Arc<Mutex<Vec<Request>>>) {
    let mut queue = waiting.lock().await;
    if queue.is_empty() {
        return;
    }
    info!(stranded = queue.len(), "cancelling requests left at shutdown");
    for request in queue.drain(..) {
        let _ = request.sink().send(Err(GenerationError::Cancelled));
    }
}

#[inline]
async fn timeout_await_notifier(notifier: &Notify) -> Result<(), Elapsed> {
    tokio::time::timeout(Duration::from_millis(100), notifier.notified()).await
}

/// Forms the next batch, or `None` if the queue turned out to be empty
/// or a shutdown wake arrived while the batch was open.
///
/// The batch opens at its first request and closes as soon as either
/// bound is hit: `max_batch_size` members, or `batch_wait_timeout`
/// elapsed since that first request arrived. A batch never waits on an
/// empty queue and never closes empty. On shutdown the open members are
/// returned to the queue for the caller to dispose of.
pub(crate) async fn form_batch(
    policy: &BatchPolicy,
    waiting: &Arc<Mutex<Vec<Request>>>,
    notifier: &Notify,
    running: &AtomicBool,
) -> Option<Batch> {
    let mut members = drain_waiting(waiting, policy.max_batch_size).await;
    if members.is_empty() {
        return None;
    }
    if members.len() >= policy.max_batch_size {
        return Some(Batch::new(members, CloseReason::Size));
    }

    // The wait window is anchored to the first member's arrival, so time
    // already spent queued behind a previous batch counts against it.
    let deadline =
        tokio::time::Instant::from_std(members[0].arrival() + policy.batch_wait_timeout);

    let reason = loop {
        tokio::select! {
            _ = notifier.notified() => {
                if !running.load(Ordering::SeqCst) {
                    // Shutdown wake: hand the members back so the caller
                    // can dispose of the whole queue in one place.
                    let mut queue = waiting.lock().await;
                    members.extend(queue.drain(..));
                    *queue = members;
                    return None;
                }
                let room = policy.max_batch_size - members.len();
                members.append(&mut drain_waiting(waiting, room).await);
                if members.len() >= policy.max_batch_size {
                    break CloseReason::Size;
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                break CloseReason::Timeout;
            }
        }
    };

    Some(Batch::new(members, reason))
}

async fn drain_waiting(waiting: &Arc<Mutex<Vec<Request>>>, limit: usize) -> Vec<Request> {
    let mut queue = waiting.lock().await;
    let take = limit.min(queue.len());
    queue.drain(0..take).collect()
}

/// Drives one batch through generation: spawns the blocking worker,
/// demultiplexes its steps, and waits for both to finish.
async fn run_batch(ctx: &PipelineContext, batch: Batch) {
    let (step_tx, step_rx) = step_bridge(ctx.bridge.capacity, ctx.bridge.stall_timeout);

    let prompts = batch.prompts();
    let tokenizer = ctx.tokenizer.clone();
    let engine = ctx.engine.clone();
    let sampling = ctx.sampling;
    let telemetry = ctx.telemetry.clone();

    let worker = tokio::task::spawn_blocking(move || {
        generate::generate_batch(tokenizer, engine, prompts, sampling, step_tx, telemetry)
    });

    let outcome = demux::pump(step_rx, batch, ctx.tokenizer.clone()).await;

    match outcome {
        PumpOutcome::Stalled => {
            // The worker is presumed dead; joining it could block the
            // whole queue behind a hung generation call. Detach and move
            // on. Its bridge sender now has no receiver, so anything it
            // still produces goes nowhere.
            warn!("detaching stalled generation worker");
            drop(worker);
        }
        PumpOutcome::Completed | PumpOutcome::Failed => {
            if let Err(join_error) = worker.await {
                warn!(error = %join_error, "generation worker panicked");
            }
        }
    }
}
