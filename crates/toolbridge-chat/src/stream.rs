use crate::chunk::{ChatChunk, ChunkKind};
use crate::codec::make_chunk;
use crate::dialect::Dialect;
use crate::orchestrator::{ChatOutcome, Termination};
use futures_util::{Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;

/// Pull-based view of a running chat.
///
/// Yields every chunk the run produces, in order, and ends after the terminal
/// `STREAM_END` or `ERROR` chunk. If the producing task panics, one `ERROR` chunk is
/// yielded in place of the panic. Dropping the stream cancels the run; its sessions
/// are still closed.
pub struct ChatStream {
    rx: mpsc::Receiver<ChatChunk>,
    handle: Option<JoinHandle<ChatOutcome>>,
    dialect: Dialect,
    outcome: Option<ChatOutcome>,
}

impl ChatStream {
    pub(crate) fn new(
        rx: mpsc::Receiver<ChatChunk>,
        handle: JoinHandle<ChatOutcome>,
        dialect: Dialect,
    ) -> Self {
        Self {
            rx,
            handle: Some(handle),
            dialect,
            outcome: None,
        }
    }

    /// Dialect of the synthetic chunks.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The run's outcome, once the stream has ended.
    pub fn outcome(&self) -> Option<&ChatOutcome> {
        self.outcome.as_ref()
    }

    /// Drains the remaining chunks and returns the outcome.
    pub async fn finish(mut self) -> ChatOutcome {
        while self.next().await.is_some() {}
        self.outcome.take().unwrap_or_else(|| {
            ChatOutcome::new(
                Vec::new(),
                0,
                Termination::Failed("stream ended without an outcome".into()),
            )
        })
    }
}

impl Stream for ChatStream {
    type Item = ChatChunk;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<ChatChunk>> {
        let this = self.get_mut();

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(chunk)) => return Poll::Ready(Some(chunk)),
            Poll::Ready(None) => {}
            Poll::Pending => return Poll::Pending,
        }

        let Some(handle) = this.handle.as_mut() else {
            return Poll::Ready(None);
        };
        let joined = match Pin::new(handle).poll(cx) {
            Poll::Ready(joined) => joined,
            Poll::Pending => return Poll::Pending,
        };
        this.handle = None;

        match joined {
            Ok(outcome) => {
                this.outcome = Some(outcome);
                Poll::Ready(None)
            }
            Err(e) => {
                error!(error = %e, "Chat producer task failed");
                let message = if e.is_panic() {
                    "Error: chat run panicked".to_string()
                } else {
                    format!("Error: chat run aborted: {e}")
                };
                this.outcome = Some(ChatOutcome::new(
                    Vec::new(),
                    0,
                    Termination::Failed(message.clone()),
                ));
                Poll::Ready(Some(make_chunk(ChunkKind::Error, &message, this.dialect)))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use toolbridge_core::ChatMessage;

    #[tokio::test]
    async fn test_yields_chunks_then_outcome() {
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(async move {
            tx.send(make_chunk(ChunkKind::Progress, "working", Dialect::OpenAi))
                .await
                .unwrap();
            ChatOutcome::new(vec![ChatMessage::user("q")], 1, Termination::Completed)
        });
        let mut stream = ChatStream::new(rx, handle, Dialect::OpenAi);

        let first = stream.next().await.unwrap();
        assert_eq!(first.event(), Some((ChunkKind::Progress, "working")));
        assert!(stream.next().await.is_none());
        assert!(stream.next().await.is_none());

        let outcome = stream.outcome().unwrap();
        assert_eq!(outcome.termination, Termination::Completed);
        assert_eq!(outcome.turns, 1);
    }

    #[tokio::test]
    async fn test_panicking_producer_becomes_error_chunk() {
        let (tx, rx) = mpsc::channel(4);
        let handle: JoinHandle<ChatOutcome> = tokio::spawn(async move {
            tx.send(make_chunk(ChunkKind::StreamStart, "", Dialect::Anthropic))
                .await
                .unwrap();
            panic!("producer exploded");
        });
        let stream = ChatStream::new(rx, handle, Dialect::Anthropic);
        let chunks: Vec<ChatChunk> = stream.collect().await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].kind(), Some(ChunkKind::StreamStart));
        assert!(chunks[1].is_error());
        assert!(matches!(chunks[1], ChatChunk::Anthropic(_)));
    }

    #[tokio::test]
    async fn test_finish_after_panic_reports_failure() {
        let (tx, rx) = mpsc::channel::<ChatChunk>(1);
        let handle: JoinHandle<ChatOutcome> = tokio::spawn(async move { panic!("boom") });
        drop(tx);
        let outcome = ChatStream::new(rx, handle, Dialect::OpenAi).finish().await;
        assert!(matches!(outcome.termination, Termination::Failed(_)));
    }
}
