//! One started handler call, and what happens to calls nobody awaits.
//!
//! A handler invocation is either finished on the publisher's stack
//! ([`Invocation::Done`], sync shapes) or a boxed future ([`Invocation::Started`]).
//! Futures that the caller does not await are handed to [`fire_and_forget`]:
//! polled once inline, spawned on the current tokio runtime if still pending,
//! and their faults reported through `tracing::warn!`.

use std::panic::AssertUnwindSafe;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::task::noop_waker_ref;
use futures::FutureExt;
use tokio::runtime::Handle;

use crate::error::{HandlerError, HandlerResult, RequestResult};

/// Result of starting one handler call.
pub(crate) enum Invocation<O> {
    /// Completed synchronously.
    Done(O),
    /// Returned a future that has not been polled yet.
    Started(BoxFuture<'static, O>),
}

impl<O> Invocation<O> {
    /// Awaits the invocation to completion.
    pub(crate) async fn resolve(self) -> O {
        match self {
            Invocation::Done(out) => out,
            Invocation::Started(fut) => fut.await,
        }
    }
}

impl<O: Outcome> Invocation<O> {
    /// Returns the outcome if it is available without waiting.
    ///
    /// A started future is polled once; if it is still pending it is
    /// detached and `None` is returned.
    pub(crate) fn now_or_detach(self, channel: &'static str) -> Option<O> {
        match self {
            Invocation::Done(out) => Some(out),
            Invocation::Started(mut fut) => {
                let mut cx = Context::from_waker(noop_waker_ref());
                match fut.as_mut().poll(&mut cx) {
                    Poll::Ready(out) => Some(out),
                    Poll::Pending => {
                        detach(fut, channel);
                        None
                    }
                }
            }
        }
    }
}

/// Uniform view over broadcast and request outcomes.
///
/// Broadcast success is `Some(())`; a request handler that declined is `None`.
pub(crate) trait Outcome: Send + 'static {
    type Value: Send + 'static;

    fn into_parts(self) -> Result<Option<Self::Value>, HandlerError>;
}

impl Outcome for HandlerResult {
    type Value = ();

    #[inline]
    fn into_parts(self) -> Result<Option<()>, HandlerError> {
        self.map(Some)
    }
}

impl<R: Send + 'static> Outcome for RequestResult<R> {
    type Value = R;

    #[inline]
    fn into_parts(self) -> Result<Option<R>, HandlerError> {
        self
    }
}

/// Starts a future the caller will not await.
///
/// The first poll happens inline, so handlers that finish without
/// suspending never touch the runtime.
pub(crate) fn fire_and_forget<O: Outcome>(mut fut: BoxFuture<'static, O>, channel: &'static str) {
    let mut cx = Context::from_waker(noop_waker_ref());
    match fut.as_mut().poll(&mut cx) {
        Poll::Ready(out) => report(out, channel),
        Poll::Pending => detach(fut, channel),
    }
}

/// Moves a pending future onto the current tokio runtime.
///
/// Without a runtime the future cannot make progress and is dropped.
pub(crate) fn detach<O: Outcome>(fut: BoxFuture<'static, O>, channel: &'static str) {
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(out) => report(out, channel),
                    Err(panic_err) => {
                        let info = panic_message(&*panic_err);
                        tracing::warn!(channel, panic = %info, "detached handler panicked");
                    }
                }
            });
        }
        Err(_) => {
            tracing::warn!(channel, "no tokio runtime, dropping pending handler future");
        }
    }
}

fn report<O: Outcome>(out: O, channel: &'static str) {
    if let Err(err) = out.into_parts() {
        tracing::warn!(
            channel,
            label = err.as_label(),
            error = %err,
            "unobserved handler failure"
        );
    }
}

fn panic_message(any: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::oneshot;

    #[test]
    fn test_outcome_views() {
        let ok: HandlerResult = Ok(());
        assert_eq!(ok.into_parts(), Ok(Some(())));

        let declined: RequestResult<u8> = Ok(None);
        assert_eq!(declined.into_parts(), Ok(None));

        let failed: RequestResult<u8> = Err(HandlerError::Canceled);
        assert_eq!(failed.into_parts(), Err(HandlerError::Canceled));
    }

    #[test]
    fn test_ready_future_needs_no_runtime() {
        let inv: Invocation<RequestResult<u8>> = Invocation::Started(async { Ok(Some(7)) }.boxed());
        assert_eq!(inv.now_or_detach("Test"), Some(Ok(Some(7))));
    }

    #[test]
    fn test_pending_future_without_runtime_is_dropped() {
        let (_tx, rx) = oneshot::channel::<()>();
        let inv: Invocation<HandlerResult> = Invocation::Started(
            async move {
                let _ = rx.await;
                Ok(())
            }
            .boxed(),
        );
        assert!(inv.now_or_detach("Test").is_none());
    }

    #[tokio::test]
    async fn test_fire_and_forget_finishes_on_runtime() {
        let (tx, rx) = oneshot::channel::<()>();
        let finished = Arc::new(AtomicBool::new(false));
        let f = Arc::clone(&finished);

        fire_and_forget::<HandlerResult>(
            async move {
                let _ = rx.await;
                f.store(true, Ordering::SeqCst);
                Ok(())
            }
            .boxed(),
            "Test",
        );
        assert!(!finished.load(Ordering::SeqCst));

        tx.send(()).unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(finished.load(Ordering::SeqCst));
    }
}
