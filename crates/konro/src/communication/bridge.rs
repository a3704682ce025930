//! The per-batch step bridge.
//!
//! A generation worker cannot suspend cooperatively: it is driving one
//! long synchronous call and reports progress from inside that call's
//! step callback. The consumer, by contrast, runs on the async runtime
//! and must suspend while waiting. The bridge decouples the two with a
//! bounded mpsc channel: the producer uses a blocking send, the consumer
//! an awaitable receive under a stall ceiling, so neither side ever busy
//! polls.
//!
//! One bridge serves exactly one batch. It is finite and non-restartable:
//! after the terminal sentinel ([`StepEvent::Done`] or
//! [`StepEvent::Failed`]) no further events are produced.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::batch::DecodingStep;
use crate::error::GenerationError;

/// One event observed by the bridge consumer, in strict FIFO order.
#[derive(Debug)]
pub(crate) enum StepEvent {
    /// A decoding step's per-request outputs.
    Step(DecodingStep),
    /// Terminal sentinel: generation finished normally.
    Done,
    /// Terminal sentinel: generation failed mid-batch.
    Failed(GenerationError),
}

/// The consumer hung up before the producer finished.
#[derive(Debug)]
pub(crate) struct BridgeClosed;

/// No event arrived within the stall ceiling.
#[derive(Debug)]
pub(crate) struct Stalled(pub Duration);

/// Creates a bridge for one batch.
///
/// `capacity` bounds how many steps may buffer before the producer
/// blocks; `stall_timeout` is how long the consumer waits for the next
/// event before presuming the producer dead.
pub(crate) fn step_bridge(
    capacity: usize,
    stall_timeout: Duration,
) -> (StepSender, StepReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        StepSender { tx },
        StepReceiver { rx, stall_timeout },
    )
}

/// Producer half, owned by the generation worker thread.
///
/// All methods block; they must not be called from the async runtime.
pub(crate) struct StepSender {
    tx: mpsc::Sender<StepEvent>,
}

impl StepSender {
    /// Delivers one decoding step, blocking while the channel is full.
    ///
    /// An error means the consumer is gone; the worker should stop
    /// pushing but may keep generating.
    pub fn put(&self, step: DecodingStep) -> Result<(), BridgeClosed> {
        self.tx
            .blocking_send(StepEvent::Step(step))
            .map_err(|_| BridgeClosed)
    }

    /// Delivers the terminal sentinel and closes the bridge.
    pub fn end(self) {
        let _ = self.tx.blocking_send(StepEvent::Done);
    }

    /// Delivers the error sentinel and closes the bridge.
    pub fn fail(self, error: GenerationError) {
        let _ = self.tx.blocking_send(StepEvent::Failed(error));
    }
}

/// Consumer half, owned by the demultiplexer on the async runtime.
pub(crate) struct StepReceiver {
    rx: mpsc::Receiver<StepEvent>,
    stall_timeout: Duration,
}

impl StepReceiver {
    /// Awaits the next event.
    ///
    /// `Ok(None)` means the producer dropped its sender without a
    /// terminal sentinel (the worker died); `Err` means nothing arrived
    /// within the stall ceiling.
    pub async fn next_event(&mut self) -> Result<Option<StepEvent>, Stalled> {
        tokio::time::timeout(self.stall_timeout, self.rx.recv())
            .await
            .map_err(|_| Stalled(self.stall_timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn step(index: u64, token: u32) -> DecodingStep {
        DecodingStep::new(index, vec![vec![token]])
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn events_arrive_in_put_order() {
        let (tx, mut rx) = step_bridge(2, Duration::from_secs(5));

        let producer = thread::spawn(move || {
            for i in 0..4 {
                tx.put(step(i, 100 + i as u32)).unwrap();
            }
            tx.end();
        });

        let mut seen = vec![];
        loop {
            match rx.next_event().await.unwrap() {
                Some(StepEvent::Step(s)) => seen.push(s.index()),
                Some(StepEvent::Done) => break,
                other => panic!("unexpected event: {other:?}"),
            }
        }
        producer.join().unwrap();

        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failure_sentinel_is_observed() {
        let (tx, mut rx) = step_bridge(2, Duration::from_secs(5));

        thread::spawn(move || {
            tx.fail(GenerationError::Engine("boom".into()));
        })
        .join()
        .unwrap();

        match rx.next_event().await.unwrap() {
            Some(StepEvent::Failed(GenerationError::Engine(msg))) => {
                assert_eq!(msg, "boom");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn silent_producer_trips_the_stall_ceiling() {
        let (tx, mut rx) = step_bridge(2, Duration::from_millis(50));

        let result = rx.next_event().await;
        assert!(matches!(result, Err(Stalled(_))));
        drop(tx);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropped_producer_reads_as_closed() {
        let (tx, mut rx) = step_bridge(2, Duration::from_secs(5));
        drop(tx);

        let event = rx.next_event().await.unwrap();
        assert!(event.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn put_reports_closed_consumer() {
        let (tx, rx) = step_bridge(1, Duration::from_secs(5));
        drop(rx);

        let result = thread::spawn(move || tx.put(step(0, 1)))
            .join()
            .unwrap();
        assert!(result.is_err());
    }
}
