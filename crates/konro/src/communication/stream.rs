//! The per-caller token stream.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::batch::Fragment;
use crate::error::GenerationError;

/// An asynchronous stream of decoded text fragments for one request.
///
/// Returned by [`crate::TextGenerator::submit`] immediately at admission;
/// the caller suspends only while waiting for fragments, never while
/// being admitted.
///
/// The stream yields one `Ok` fragment per decoding step. If the batch's
/// generation call fails, the final item is an `Err` carrying the shared
/// [`GenerationError`]; in either case the stream then terminates. All
/// members of a batch terminate in the same tick, since they share one
/// generation call.
pub struct TokenStream {
    receiver: mpsc::UnboundedReceiver<Fragment>,
}

impl TokenStream {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<Fragment>) -> Self {
        Self { receiver }
    }
}

impl Stream for TokenStream {
    type Item = Result<String, GenerationError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().receiver).poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn yields_fragments_then_terminates() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Ok("hello".to_string())).unwrap();
        tx.send(Ok(" world".to_string())).unwrap();
        drop(tx);

        let stream = TokenStream::new(rx);
        let items: Vec<_> = stream.collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().unwrap(), "hello");
        assert_eq!(items[1].as_deref().unwrap(), " world");
    }

    #[tokio::test]
    async fn failure_marker_is_the_last_item() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Ok("partial".to_string())).unwrap();
        tx.send(Err(GenerationError::WorkerExited)).unwrap();
        drop(tx);

        let mut stream = TokenStream::new(rx);
        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
