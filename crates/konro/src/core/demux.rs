//! The response demultiplexer.
//!
//! Consumes one batch's bridge, decodes each step's per-request outputs,
//! and routes them by position to the batch members' streams. Owns every
//! member's sink for the batch's lifetime and closes them all, exactly
//! once, when the batch ends.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::batch::Batch;
use crate::communication::{StepEvent, StepReceiver};
use crate::error::GenerationError;
use crate::model::Tokenizer;

/// How a batch's demultiplexing ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PumpOutcome {
    /// Terminal sentinel observed; every stream closed normally.
    Completed,
    /// Error sentinel, shape violation, or vanished worker; every stream
    /// received a failure marker.
    Failed,
    /// Nothing arrived within the stall ceiling; the worker may still be
    /// alive but is presumed dead.
    Stalled,
}

pub(crate) async fn pump(
    mut steps: StepReceiver,
    batch: Batch,
    tokenizer: Arc<dyn Tokenizer>,
) -> PumpOutcome {
    // Sinks that already received their failure marker (bad decode) and
    // must see nothing further.
    let mut failed = vec![false; batch.len()];

    loop {
        match steps.next_event().await {
            Err(stall) => {
                warn!(ceiling = ?stall.0, "bridge stalled, failing batch");
                fail_all(&batch, &failed, GenerationError::Stalled(stall.0));
                return PumpOutcome::Stalled;
            }
            Ok(None) => {
                warn!("bridge closed without a terminal sentinel");
                fail_all(&batch, &failed, GenerationError::WorkerExited);
                return PumpOutcome::Failed;
            }
            Ok(Some(StepEvent::Step(step))) => {
                if step.index() == 0 {
                    // The first step echoes the input prompts.
                    debug!("discarding prompt echo step");
                    continue;
                }
                if step.outputs().len() != batch.len() {
                    let error = GenerationError::ShapeMismatch {
                        expected: batch.len(),
                        got: step.outputs().len(),
                    };
                    warn!(error = %error, "refusing misaligned decoding step");
                    fail_all(&batch, &failed, error);
                    return PumpOutcome::Failed;
                }

                for (i, (ids, request)) in
                    step.outputs().iter().zip(batch.requests()).enumerate()
                {
                    if failed[i] {
                        continue;
                    }
                    match tokenizer.decode(ids) {
                        // A send error means the caller disconnected;
                        // siblings are unaffected and the batch goes on.
                        Ok(text) => {
                            let _ = request.sink().send(Ok(text));
                        }
                        Err(error) => {
                            warn!(request = %request.id(), error = %error, "decode failed");
                            let _ = request.sink().send(Err(error));
                            failed[i] = true;
                        }
                    }
                }
            }
            // Dropping the batch on return closes every remaining sink in
            // the same tick: all members finish together.
            Ok(Some(StepEvent::Done)) => {
                debug!(
                    batch_ms = batch.formed_at().elapsed().as_millis() as u64,
                    "batch complete, closing streams"
                );
                return PumpOutcome::Completed;
            }
            Ok(Some(StepEvent::Failed(error))) => {
                fail_all(&batch, &failed, error);
                return PumpOutcome::Failed;
            }
        }
    }
}

fn fail_all(batch: &Batch, already_failed: &[bool], error: GenerationError) {
    for (request, failed) in batch.requests().iter().zip(already_failed) {
        if !failed {
            let _ = request.sink().send(Err(error.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{CloseReason, DecodingStep, Fragment, Request};
    use crate::communication::step_bridge;
    use crate::mock::MockTokenizer;
    use std::thread;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn batch_of(n: usize) -> (Batch, Vec<mpsc::UnboundedReceiver<Fragment>>) {
        let mut requests = vec![];
        let mut receivers = vec![];
        for i in 0..n {
            let (tx, rx) = mpsc::unbounded_channel();
            requests.push(Request::new(format!("prompt {i}"), tx));
            receivers.push(rx);
        }
        (Batch::new(requests, CloseReason::Size), receivers)
    }

    async fn collect(mut rx: mpsc::UnboundedReceiver<Fragment>) -> Vec<Fragment> {
        let mut items = vec![];
        while let Some(item) = rx.recv().await {
            items.push(item);
        }
        items
    }

    // 'a' is 97; steps carry codepoints so fragments decode predictably.
    fn ids(c: char) -> Vec<u32> {
        vec![c as u32]
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn routes_by_position_and_suppresses_the_echo() {
        let (batch, receivers) = batch_of(2);
        let (tx, rx) = step_bridge(8, Duration::from_secs(5));

        let producer = thread::spawn(move || {
            // Echo step: full prompts, must never reach a caller.
            tx.put(DecodingStep::new(0, vec![ids('x'), ids('y')])).unwrap();
            tx.put(DecodingStep::new(1, vec![ids('a'), ids('m')])).unwrap();
            tx.put(DecodingStep::new(2, vec![ids('b'), ids('n')])).unwrap();
            tx.end();
        });

        let outcome = pump(rx, batch, Arc::new(MockTokenizer)).await;
        producer.join().unwrap();
        assert_eq!(outcome, PumpOutcome::Completed);

        let mut streams = receivers.into_iter();
        let first: Vec<_> = collect(streams.next().unwrap()).await;
        let second: Vec<_> = collect(streams.next().unwrap()).await;

        let texts = |items: Vec<Fragment>| -> Vec<String> {
            items.into_iter().map(|f| f.unwrap()).collect()
        };
        assert_eq!(texts(first), vec!["a", "b"]);
        assert_eq!(texts(second), vec!["m", "n"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn echo_is_suppressed_for_a_batch_of_one() {
        let (batch, mut receivers) = batch_of(1);
        let (tx, rx) = step_bridge(8, Duration::from_secs(5));

        thread::spawn(move || {
            tx.put(DecodingStep::new(0, vec![ids('p')])).unwrap();
            tx.put(DecodingStep::new(1, vec![ids('q')])).unwrap();
            tx.end();
        })
        .join()
        .unwrap();

        pump(rx, batch, Arc::new(MockTokenizer)).await;

        let items = collect(receivers.remove(0)).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_deref().unwrap(), "q");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn error_sentinel_fails_every_member() {
        let (batch, receivers) = batch_of(3);
        let (tx, rx) = step_bridge(8, Duration::from_secs(5));

        thread::spawn(move || {
            tx.put(DecodingStep::new(0, vec![ids('x'); 3])).unwrap();
            tx.put(DecodingStep::new(1, vec![ids('a'); 3])).unwrap();
            tx.fail(GenerationError::Engine("device lost".into()));
        })
        .join()
        .unwrap();

        let outcome = pump(rx, batch, Arc::new(MockTokenizer)).await;
        assert_eq!(outcome, PumpOutcome::Failed);

        for rx in receivers {
            let items = collect(rx).await;
            // One streamed fragment, preserved, then the failure marker.
            assert_eq!(items.len(), 2);
            assert!(items[0].is_ok());
            assert!(matches!(items[1], Err(GenerationError::Engine(_))));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn misaligned_step_fails_the_batch() {
        let (batch, receivers) = batch_of(2);
        let (tx, rx) = step_bridge(8, Duration::from_secs(5));

        thread::spawn(move || {
            tx.put(DecodingStep::new(0, vec![ids('x'), ids('y')])).unwrap();
            // Only one output for a batch of two.
            let _ = tx.put(DecodingStep::new(1, vec![ids('a')]));
        })
        .join()
        .unwrap();

        let outcome = pump(rx, batch, Arc::new(MockTokenizer)).await;
        assert_eq!(outcome, PumpOutcome::Failed);

        for rx in receivers {
            let items = collect(rx).await;
            assert_eq!(items.len(), 1);
            assert!(matches!(
                items[0],
                Err(GenerationError::ShapeMismatch { expected: 2, got: 1 })
            ));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stalled_bridge_fails_the_batch() {
        let (batch, receivers) = batch_of(2);
        let (tx, rx) = step_bridge(8, Duration::from_millis(50));

        let outcome = pump(rx, batch, Arc::new(MockTokenizer)).await;
        assert_eq!(outcome, PumpOutcome::Stalled);
        drop(tx);

        for rx in receivers {
            let items = collect(rx).await;
            assert_eq!(items.len(), 1);
            assert!(matches!(items[0], Err(GenerationError::Stalled(_))));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn vanished_worker_fails_the_batch() {
        let (batch, receivers) = batch_of(1);
        let (tx, rx) = step_bridge(8, Duration::from_secs(5));
        drop(tx);

        let outcome = pump(rx, batch, Arc::new(MockTokenizer)).await;
        assert_eq!(outcome, PumpOutcome::Failed);

        for rx in receivers {
            let items = collect(rx).await;
            assert!(matches!(items[0], Err(GenerationError::WorkerExited)));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn disconnected_caller_does_not_disturb_siblings() {
        let (batch, mut receivers) = batch_of(2);
        // First caller hangs up before any output arrives.
        receivers.remove(0);

        let (tx, rx) = step_bridge(8, Duration::from_secs(5));
        thread::spawn(move || {
            tx.put(DecodingStep::new(0, vec![ids('x'), ids('y')])).unwrap();
            tx.put(DecodingStep::new(1, vec![ids('a'), ids('m')])).unwrap();
            tx.put(DecodingStep::new(2, vec![ids('b'), ids('n')])).unwrap();
            tx.end();
        })
        .join()
        .unwrap();

        let outcome = pump(rx, batch, Arc::new(MockTokenizer)).await;
        assert_eq!(outcome, PumpOutcome::Completed);

        let items = collect(receivers.remove(0)).await;
        let texts: Vec<_> = items.into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(texts, vec!["m", "n"]);
    }
}
