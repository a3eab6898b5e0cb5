//! # Predicate decorator
//!
//! [`Filter`] forwards a message only when its predicate returns `true`.
//! It sits at `order = i32::MIN`, so it runs before any other middleware
//! and a rejected message never reaches them.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{HandlerResult, RequestResult};
use crate::handlers::decorator::{Decorator, RequestDecorator};
use crate::handlers::handler::{AsyncFn, CancelableFn, SyncFn};
use crate::handlers::request::{AsyncRequestFn, CancelableRequestFn, SyncRequestFn};

/// Predicate-based message filter.
///
/// Works both as a broadcast [`Decorator`] (rejected → `Ok(())`) and as a
/// [`RequestDecorator`] (rejected → `Ok(None)`).
pub struct Filter<T> {
    predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T> Filter<T> {
    /// Creates a filter from a predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    /// Creates the filter and returns it as a shared handle.
    pub fn arc<F>(predicate: F) -> Arc<Self>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Arc::new(Self::new(predicate))
    }

    #[inline]
    fn accepts(&self, msg: &T) -> bool {
        (self.predicate)(msg)
    }
}

impl<T> fmt::Debug for Filter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter").finish_non_exhaustive()
    }
}

#[async_trait]
impl<T: Send + 'static> Decorator<T> for Filter<T> {
    fn order(&self) -> i32 {
        i32::MIN
    }

    fn handle(&self, msg: &T, next: &SyncFn<T>) -> HandlerResult {
        if self.accepts(msg) {
            next(msg)
        } else {
            Ok(())
        }
    }

    async fn handle_async(&self, msg: T, next: AsyncFn<T>) -> HandlerResult {
        if self.accepts(&msg) {
            next(msg).await
        } else {
            Ok(())
        }
    }

    async fn handle_cancelable(
        &self,
        msg: T,
        token: CancellationToken,
        next: CancelableFn<T>,
    ) -> HandlerResult {
        if self.accepts(&msg) {
            next(msg, token).await
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<T: Send + 'static, R: Send + 'static> RequestDecorator<T, R> for Filter<T> {
    fn order(&self) -> i32 {
        i32::MIN
    }

    fn try_handle(&self, msg: &T, next: &SyncRequestFn<T, R>) -> RequestResult<R> {
        if self.accepts(msg) {
            next(msg)
        } else {
            Ok(None)
        }
    }

    async fn try_handle_async(&self, msg: T, next: AsyncRequestFn<T, R>) -> RequestResult<R> {
        if self.accepts(&msg) {
            next(msg).await
        } else {
            Ok(None)
        }
    }

    async fn try_handle_cancelable(
        &self,
        msg: T,
        token: CancellationToken,
        next: CancelableRequestFn<T, R>,
    ) -> RequestResult<R> {
        if self.accepts(&msg) {
            next(msg, token).await
        } else {
            Ok(None)
        }
    }
}
