//! # Request handler (`RequestHandler<T, R>`)
//!
//! Same three call shapes as [`Handler`](crate::Handler), but every shape
//! answers with a [`RequestResult<R>`]: `Ok(Some(r))` when the handler produced
//! a response, `Ok(None)` when it declined. Requester channels use the
//! `Some`/`None` distinction to pick the first responder or to collect all of them.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::dispatch::Invocation;
use crate::error::RequestResult;
use crate::handlers::Shape;

/// Synchronous request delegate.
pub type SyncRequestFn<T, R> = Arc<dyn Fn(&T) -> RequestResult<R> + Send + Sync>;

/// Awaitable request delegate.
pub type AsyncRequestFn<T, R> =
    Arc<dyn Fn(T) -> BoxFuture<'static, RequestResult<R>> + Send + Sync>;

/// Awaitable request delegate that observes a cancellation token.
pub type CancelableRequestFn<T, R> =
    Arc<dyn Fn(T, CancellationToken) -> BoxFuture<'static, RequestResult<R>> + Send + Sync>;

/// Request handler in one of three call shapes.
pub enum RequestHandler<T, R> {
    /// Synchronous callback.
    Sync(SyncRequestFn<T, R>),
    /// Future-returning callback.
    Async(AsyncRequestFn<T, R>),
    /// Future-returning callback threading a cancellation token.
    AsyncCancelable(CancelableRequestFn<T, R>),
}

impl<T: 'static, R: 'static> RequestHandler<T, R> {
    /// Wraps a synchronous callback that may decline (`Ok(None)`).
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&T) -> RequestResult<R> + Send + Sync + 'static,
    {
        RequestHandler::Sync(Arc::new(f))
    }

    /// Wraps an infallible responder that always answers.
    ///
    /// # Example
    /// ```rust
    /// use eventvisor::{RequestHandler, Shape};
    ///
    /// let double: RequestHandler<i32, i32> = RequestHandler::from_fn(|n: &i32| n * 2);
    /// assert_eq!(double.shape(), Shape::Sync);
    /// ```
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        RequestHandler::Sync(Arc::new(move |msg| Ok(Some(f(msg)))))
    }

    /// Wraps a callback that returns a future.
    pub fn async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RequestResult<R>> + Send + 'static,
    {
        RequestHandler::Async(Arc::new(move |msg| f(msg).boxed()))
    }

    /// Wraps a callback that returns a future and observes cancellation.
    pub fn cancelable<F, Fut>(f: F) -> Self
    where
        F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RequestResult<R>> + Send + 'static,
    {
        RequestHandler::AsyncCancelable(Arc::new(move |msg, token| f(msg, token).boxed()))
    }
}

impl<T, R> RequestHandler<T, R> {
    /// Returns the fixed call shape.
    pub fn shape(&self) -> Shape {
        match self {
            RequestHandler::Sync(_) => Shape::Sync,
            RequestHandler::Async(_) => Shape::Async,
            RequestHandler::AsyncCancelable(_) => Shape::AsyncCancelable,
        }
    }
}

impl<T: Clone + Send + 'static, R: Send + 'static> RequestHandler<T, R> {
    pub(crate) fn invoke(
        &self,
        msg: &T,
        token: Option<&CancellationToken>,
    ) -> Invocation<RequestResult<R>> {
        match self {
            RequestHandler::Sync(f) => Invocation::Done(f(msg)),
            RequestHandler::Async(f) => Invocation::Started(f(msg.clone())),
            RequestHandler::AsyncCancelable(f) => {
                let token = token.cloned().unwrap_or_else(CancellationToken::new);
                Invocation::Started(f(msg.clone(), token))
            }
        }
    }
}

impl<T, R> Clone for RequestHandler<T, R> {
    fn clone(&self) -> Self {
        match self {
            RequestHandler::Sync(f) => RequestHandler::Sync(Arc::clone(f)),
            RequestHandler::Async(f) => RequestHandler::Async(Arc::clone(f)),
            RequestHandler::AsyncCancelable(f) => RequestHandler::AsyncCancelable(Arc::clone(f)),
        }
    }
}

impl<T, R> fmt::Debug for RequestHandler<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandler")
            .field("shape", &self.shape())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fn_always_answers() {
        let h: RequestHandler<i32, String> = RequestHandler::from_fn(|n: &i32| n.to_string());
        match h.invoke(&42, None) {
            Invocation::Done(res) => assert_eq!(res, Ok(Some("42".to_string()))),
            Invocation::Started(_) => panic!("sync handler must complete inline"),
        }
    }

    #[tokio::test]
    async fn test_async_handler_may_decline() {
        let h: RequestHandler<i32, i32> = RequestHandler::async_fn(|n| async move {
            Ok(if n % 2 == 0 { Some(n / 2) } else { None })
        });
        assert_eq!(h.invoke(&4, None).resolve().await, Ok(Some(2)));
        assert_eq!(h.invoke(&3, None).resolve().await, Ok(None));
    }
}
