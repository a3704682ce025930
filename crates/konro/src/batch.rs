//! Request and batch containers moving through the pipeline.

use std::time::Instant;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::GenerationError;

/// One decoded text fragment, or the failure that ended the stream.
pub(crate) type Fragment = Result<String, GenerationError>;

/// Sink half of a caller's token stream.
pub(crate) type FragmentSender = mpsc::UnboundedSender<Fragment>;

/// A single admitted request waiting for, or owned by, a batch.
///
/// The admission controller owns the request until it is placed in a
/// [`Batch`]; from then on the sink belongs to the demultiplexer, which
/// closes it exactly once by dropping it.
#[derive(Debug)]
pub(crate) struct Request {
    id: Uuid,
    prompt: String,
    arrival: Instant,
    sink: FragmentSender,
}

impl Request {
    pub fn new(prompt: String, sink: FragmentSender) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt,
            arrival: Instant::now(),
            sink,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn arrival(&self) -> Instant {
        self.arrival
    }

    pub fn sink(&self) -> &FragmentSender {
        &self.sink
    }
}

/// Why a batch stopped accepting members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseReason {
    /// `max_batch_size` was reached.
    Size,
    /// `batch_wait_timeout` elapsed since the first request arrived.
    Timeout,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Size => "size",
            CloseReason::Timeout => "timeout",
        }
    }
}

/// A closed group of requests served by exactly one generation call.
///
/// Member order is arrival order and is never changed: every decoding
/// step's outputs are routed back to members by position.
#[derive(Debug)]
pub(crate) struct Batch {
    requests: Vec<Request>,
    formed_at: Instant,
    reason: CloseReason,
}

impl Batch {
    pub fn new(requests: Vec<Request>, reason: CloseReason) -> Self {
        debug_assert!(!requests.is_empty(), "a batch holds at least one request");
        Self {
            requests,
            formed_at: Instant::now(),
            reason,
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .iter()
            .map(|request| request.prompt().to_string())
            .collect()
    }

    pub fn reason(&self) -> CloseReason {
        self.reason
    }

    pub fn formed_at(&self) -> Instant {
        self.formed_at
    }
}

/// Output of one decoding step for a whole batch.
///
/// `outputs` is aligned 1:1 with the batch's request order. Step 0 echoes
/// the input prompts and is discarded by the demultiplexer.
#[derive(Debug, Clone)]
pub(crate) struct DecodingStep {
    index: u64,
    outputs: Vec<Vec<u32>>,
}

impl DecodingStep {
    pub fn new(index: u64, outputs: Vec<Vec<u32>>) -> Self {
        Self { index, outputs }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn outputs(&self) -> &[Vec<u32>] {
        &self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn requests_get_unique_ids() {
        let (tx, _rx) = unbounded_channel();
        let a = Request::new("a".into(), tx.clone());
        let b = Request::new("b".into(), tx);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn batch_preserves_arrival_order() {
        let (tx, _rx) = unbounded_channel();
        let requests = vec![
            Request::new("first".into(), tx.clone()),
            Request::new("second".into(), tx.clone()),
            Request::new("third".into(), tx),
        ];
        let batch = Batch::new(requests, CloseReason::Size);

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.prompts(), vec!["first", "second", "third"]);
        assert_eq!(batch.reason(), CloseReason::Size);
    }

    #[test]
    fn decoding_step_exposes_aligned_outputs() {
        let step = DecodingStep::new(1, vec![vec![7], vec![8]]);
        assert_eq!(step.index(), 1);
        assert_eq!(step.outputs().len(), 2);
        assert_eq!(step.outputs()[1], vec![8]);
    }
}
