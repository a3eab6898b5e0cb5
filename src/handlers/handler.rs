//! # Broadcast handler (`Handler<T>`)
//!
//! A [`Handler`] is one subscriber callback in exactly one of three call shapes:
//!
//! | Shape                    | Signature                                   |
//! |--------------------------|---------------------------------------------|
//! | [`Shape::Sync`]          | `Fn(&T) -> HandlerResult`                   |
//! | [`Shape::Async`]         | `Fn(T) -> impl Future<Output = HandlerResult>` |
//! | [`Shape::AsyncCancelable`] | `Fn(T, CancellationToken) -> impl Future<..>` |
//!
//! The shape is fixed when the handler is built and decides both the dispatch
//! path and which decorator chain the [`HandlerFactory`](crate::HandlerFactory)
//! composes. Async shapes receive their own clone of the message so the
//! returned future is `'static` and can outlive the publish call.
//!
//! ## Example
//! ```rust
//! use eventvisor::{Handler, Shape};
//!
//! let h: Handler<u32> = Handler::sync(|n: &u32| {
//!     assert!(*n > 0);
//!     Ok(())
//! });
//! assert_eq!(h.shape(), Shape::Sync);
//!
//! let h: Handler<u32> = Handler::async_fn(|n: u32| async move {
//!     let _ = n;
//!     Ok(())
//! });
//! assert_eq!(h.shape(), Shape::Async);
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::dispatch::Invocation;
use crate::error::HandlerResult;

/// Synchronous broadcast delegate.
pub type SyncFn<T> = Arc<dyn Fn(&T) -> HandlerResult + Send + Sync>;

/// Awaitable broadcast delegate.
pub type AsyncFn<T> = Arc<dyn Fn(T) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Awaitable broadcast delegate that observes a cancellation token.
pub type CancelableFn<T> =
    Arc<dyn Fn(T, CancellationToken) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Call shape of a handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Runs to completion on the publisher's stack.
    Sync,
    /// Returns a future.
    Async,
    /// Returns a future and receives a cancellation token.
    AsyncCancelable,
}

/// Broadcast handler in one of three call shapes.
pub enum Handler<T> {
    /// Synchronous callback.
    Sync(SyncFn<T>),
    /// Future-returning callback.
    Async(AsyncFn<T>),
    /// Future-returning callback threading a cancellation token.
    AsyncCancelable(CancelableFn<T>),
}

impl<T: 'static> Handler<T> {
    /// Wraps a synchronous callback.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&T) -> HandlerResult + Send + Sync + 'static,
    {
        Handler::Sync(Arc::new(f))
    }

    /// Wraps a callback that returns a future.
    pub fn async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Handler::Async(Arc::new(move |msg| f(msg).boxed()))
    }

    /// Wraps a callback that returns a future and observes cancellation.
    pub fn cancelable<F, Fut>(f: F) -> Self
    where
        F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Handler::AsyncCancelable(Arc::new(move |msg, token| f(msg, token).boxed()))
    }
}

impl<T> Handler<T> {
    /// Returns the fixed call shape.
    pub fn shape(&self) -> Shape {
        match self {
            Handler::Sync(_) => Shape::Sync,
            Handler::Async(_) => Shape::Async,
            Handler::AsyncCancelable(_) => Shape::AsyncCancelable,
        }
    }
}

impl<T: Clone + Send + 'static> Handler<T> {
    /// Starts one invocation through whichever shape this handler has.
    ///
    /// `None` means the caller did not request cancellation; a cancelable
    /// handler then receives a token that is never cancelled.
    pub(crate) fn invoke(
        &self,
        msg: &T,
        token: Option<&CancellationToken>,
    ) -> Invocation<HandlerResult> {
        match self {
            Handler::Sync(f) => Invocation::Done(f(msg)),
            Handler::Async(f) => Invocation::Started(f(msg.clone())),
            Handler::AsyncCancelable(f) => {
                let token = token.cloned().unwrap_or_else(CancellationToken::new);
                Invocation::Started(f(msg.clone(), token))
            }
        }
    }
}

impl<T> Clone for Handler<T> {
    fn clone(&self) -> Self {
        match self {
            Handler::Sync(f) => Handler::Sync(Arc::clone(f)),
            Handler::Async(f) => Handler::Async(Arc::clone(f)),
            Handler::AsyncCancelable(f) => Handler::AsyncCancelable(Arc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for Handler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("shape", &self.shape())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;

    #[test]
    fn test_shape_is_fixed_by_constructor() {
        let a: Handler<i32> = Handler::sync(|_| Ok(()));
        let b: Handler<i32> = Handler::async_fn(|_| async { Ok(()) });
        let c: Handler<i32> = Handler::cancelable(|_, _| async { Ok(()) });
        assert_eq!(a.shape(), Shape::Sync);
        assert_eq!(b.shape(), Shape::Async);
        assert_eq!(c.shape(), Shape::AsyncCancelable);
        assert_eq!(c.clone().shape(), Shape::AsyncCancelable);
    }

    #[test]
    fn test_sync_invocation_completes_inline() {
        let h: Handler<i32> = Handler::sync(|n| {
            if *n < 0 {
                Err(HandlerError::fail("negative"))
            } else {
                Ok(())
            }
        });
        assert!(matches!(h.invoke(&1, None), Invocation::Done(Ok(()))));
        assert!(matches!(h.invoke(&-1, None), Invocation::Done(Err(_))));
    }

    #[tokio::test]
    async fn test_cancelable_receives_fresh_token_without_caller_token() {
        let h: Handler<i32> = Handler::cancelable(|_, token: CancellationToken| async move {
            if token.is_cancelled() {
                Err(HandlerError::Canceled)
            } else {
                Ok(())
            }
        });
        assert_eq!(h.invoke(&1, None).resolve().await, Ok(()));

        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(
            h.invoke(&1, Some(&token)).resolve().await,
            Err(HandlerError::Canceled)
        );
    }
}
