//! Downstream output abstraction.

use crate::error::RelayError;
use crate::frame::RelayFrame;
use std::future::Future;
use thiserror::Error;
use tokio::sync::mpsc;

/// The downstream consumer is gone.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("downstream sink closed")]
pub struct SinkClosed;

/// Destination of one relay run.
///
/// A sink receives zero or more frames and then at most one terminal call.
/// Both terminal operations take `self` by value, so a second terminal
/// signal cannot be sent. A sink dropped without a terminal call was either
/// cancelled by its consumer or abandoned by a deadline.
pub trait FrameSink: Send {
    /// Delivers one frame, waiting for capacity if the consumer is slow.
    fn push_frame(
        &mut self,
        frame: RelayFrame,
    ) -> impl Future<Output = Result<(), SinkClosed>> + Send;

    /// Signals normal completion.
    fn complete(self) -> impl Future<Output = ()> + Send;

    /// Signals completion with a transport error.
    fn complete_with_error(self, error: RelayError) -> impl Future<Output = ()> + Send;

    /// Resolves once the consumer has gone away.
    fn cancelled(&self) -> impl Future<Output = ()> + Send;
}

/// Events observed by the consumer of a [`ChannelSink`].
#[derive(Debug)]
pub enum SinkEvent {
    Frame(RelayFrame),
    Completed,
    Failed(RelayError),
}

/// A [`FrameSink`] backed by a bounded tokio channel.
///
/// Dropping the receiver cancels the producing relay.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<SinkEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver its events are delivered to.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SinkEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl FrameSink for ChannelSink {
    async fn push_frame(&mut self, frame: RelayFrame) -> Result<(), SinkClosed> {
        self.tx
            .send(SinkEvent::Frame(frame))
            .await
            .map_err(|_| SinkClosed)
    }

    async fn complete(self) {
        // A consumer that left early has nothing to be told.
        let _ = self.tx.send(SinkEvent::Completed).await;
    }

    async fn complete_with_error(self, error: RelayError) {
        let _ = self.tx.send(SinkEvent::Failed(error)).await;
    }

    async fn cancelled(&self) {
        self.tx.closed().await
    }
}
