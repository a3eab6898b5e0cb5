//! One-shot "next message" waits built on a normal subscription.
//!
//! ```text
//! first_with(pred, token)
//!   ├─ subscribe(Filter(pred) → capture handler)   eager, before returning
//!   └─ future: oneshot.await | token.cancelled()
//!        └─ subscription disposed on completion, cancel or drop
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::disposables::{Dispose, DisposeOnDrop, SingleAssignment};
use crate::error::HandlerError;
use crate::handlers::Handler;

/// Builds a handler that forwards the first message it sees, then
/// disposes whatever gets assigned into `guard`.
pub(crate) fn capture<T>(guard: &Arc<SingleAssignment>) -> (Handler<T>, oneshot::Receiver<T>)
where
    T: Clone + Send + Sync + 'static,
{
    let (tx, rx) = oneshot::channel();
    let tx = Mutex::new(Some(tx));
    let guard = Arc::clone(guard);
    let handler = Handler::sync(move |msg: &T| {
        let sender = tx.lock().take();
        if let Some(sender) = sender {
            let _ = sender.send(msg.clone());
            guard.dispose();
        }
        Ok(())
    });
    (handler, rx)
}

/// Resolves with the captured message.
///
/// Cancellation, or the channel dropping the handler (dispose), yields
/// [`HandlerError::Canceled`]. `guard` lives inside the returned future,
/// so dropping it unpolled still unsubscribes.
pub(crate) async fn wait<T>(
    rx: oneshot::Receiver<T>,
    guard: DisposeOnDrop,
    token: Option<CancellationToken>,
) -> Result<T, HandlerError> {
    let received = match token {
        Some(token) => tokio::select! {
            msg = rx => msg.ok(),
            _ = token.cancelled() => None,
        },
        None => rx.await.ok(),
    };
    drop(guard);
    received.ok_or(HandlerError::Canceled)
}
