//! # Handler decorators (middleware)
//!
//! A decorator intercepts one handler invocation and decides what to do with
//! it: forward to `next`, forward a transformed message, or return without
//! calling `next` at all (the message is absorbed).
//!
//! Every method has a forwarding default, so a decorator only overrides the
//! shapes it cares about. Chains are composed by the
//! [`HandlerFactory`](crate::HandlerFactory): decorators are sorted by
//! descending [`order`](Decorator::order) and wrapped one by one, so the
//! **lowest** order ends up outermost and runs first.
//!
//! ```text
//! publish(msg) ──► d(order=-5) ──► d(order=0) ──► d(order=10) ──► handler
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use eventvisor::{Decorator, HandlerResult, SyncFn};
//!
//! /// Counts every synchronous delivery.
//! struct Counter(AtomicUsize);
//!
//! impl Decorator<String> for Counter {
//!     fn handle(&self, msg: &String, next: &SyncFn<String>) -> HandlerResult {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!         next(msg)
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{HandlerResult, RequestResult};
use crate::handlers::handler::{AsyncFn, CancelableFn, SyncFn};
use crate::handlers::request::{AsyncRequestFn, CancelableRequestFn, SyncRequestFn};

/// Shared reference to a broadcast decorator.
pub type DecoratorRef<T> = Arc<dyn Decorator<T>>;

/// Shared reference to a request decorator.
pub type RequestDecoratorRef<T, R> = Arc<dyn RequestDecorator<T, R>>;

/// Middleware around a broadcast [`Handler`](crate::Handler).
#[async_trait]
pub trait Decorator<T: Send + 'static>: Send + Sync + 'static {
    /// Position in the chain; lower runs earlier (outermost).
    ///
    /// Ties keep registration order. Default: `0`.
    fn order(&self) -> i32 {
        0
    }

    /// Intercepts a synchronous invocation.
    fn handle(&self, msg: &T, next: &SyncFn<T>) -> HandlerResult {
        next(msg)
    }

    /// Intercepts an async invocation.
    async fn handle_async(&self, msg: T, next: AsyncFn<T>) -> HandlerResult {
        next(msg).await
    }

    /// Intercepts a cancelable async invocation.
    async fn handle_cancelable(
        &self,
        msg: T,
        token: CancellationToken,
        next: CancelableFn<T>,
    ) -> HandlerResult {
        next(msg, token).await
    }
}

/// Middleware around a [`RequestHandler`](crate::RequestHandler).
///
/// Returning `Ok(None)` without calling `next` makes the wrapped handler look
/// like it declined the request.
#[async_trait]
pub trait RequestDecorator<T: Send + 'static, R: Send + 'static>: Send + Sync + 'static {
    /// Position in the chain; lower runs earlier (outermost). Default: `0`.
    fn order(&self) -> i32 {
        0
    }

    /// Intercepts a synchronous request.
    fn try_handle(&self, msg: &T, next: &SyncRequestFn<T, R>) -> RequestResult<R> {
        next(msg)
    }

    /// Intercepts an async request.
    async fn try_handle_async(&self, msg: T, next: AsyncRequestFn<T, R>) -> RequestResult<R> {
        next(msg).await
    }

    /// Intercepts a cancelable async request.
    async fn try_handle_cancelable(
        &self,
        msg: T,
        token: CancellationToken,
        next: CancelableRequestFn<T, R>,
    ) -> RequestResult<R> {
        next(msg, token).await
    }
}
