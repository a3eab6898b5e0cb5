//! Subscriptions consumed as an async [`Stream`].

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::disposables::{DisposeOnDrop, SingleAssignment};
use crate::handlers::Handler;

/// Messages delivered to one subscription, in publish order.
///
/// Dropping the stream disposes the subscription. The stream ends (`None`)
/// once the channel is disposed and every queued message has been read.
/// At most [`Options::stream_capacity`](crate::Options::stream_capacity)
/// messages wait unread; later ones are dropped until the reader catches up.
pub struct MessageStream<T> {
    rx: mpsc::Receiver<T>,
    _guard: DisposeOnDrop,
}

impl<T> MessageStream<T> {
    pub(crate) fn new(rx: mpsc::Receiver<T>, holder: Arc<SingleAssignment>) -> Self {
        Self {
            rx,
            _guard: DisposeOnDrop::new(holder),
        }
    }
}

/// Handler feeding a [`MessageStream`] through a queue of `capacity`.
pub(crate) fn feed<T>(capacity: usize, channel: &'static str) -> (Handler<T>, mpsc::Receiver<T>)
where
    T: Clone + Send + Sync + 'static,
{
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    let handler = Handler::sync(move |msg: &T| {
        match tx.try_send(msg.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(channel, capacity, "stream full, message dropped");
            }
            // Receiver gone: the stream was dropped and is unsubscribing.
            Err(TrySendError::Closed(_)) => {}
        }
        Ok(())
    });
    (handler, rx)
}

impl<T> Unpin for MessageStream<T> {}

impl<T> Stream for MessageStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl<T> fmt::Debug for MessageStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageStream").finish_non_exhaustive()
    }
}
