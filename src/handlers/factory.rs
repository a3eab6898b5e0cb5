//! # Handler factory: decorator chain composition
//!
//! [`HandlerFactory`] turns a terminal handler plus call-site decorators into
//! the single callable that a channel stores.
//!
//! ## Composition
//! ```text
//! global decorators (Options, ascending order) ++ call-site decorators
//!        └─► stable sort by descending order
//!              └─► wrap iteratively: next = |msg| d.handle(msg, &prev)
//! ```
//!
//! ## Rules
//! - No global and no call-site decorators → the terminal handler is returned
//!   unchanged (zero extra indirection).
//! - Only the chain matching the terminal's [`Shape`](crate::Shape) is built;
//!   the composed handler advertises the same shape.
//! - A decorator that never calls `next` absorbs the message.

use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::handlers::decorator::{DecoratorRef, RequestDecoratorRef};
use crate::handlers::handler::{AsyncFn, CancelableFn, Handler, SyncFn};
use crate::handlers::request::{
    AsyncRequestFn, CancelableRequestFn, RequestHandler, SyncRequestFn,
};
use crate::options::Options;

/// Composes handlers with global and call-site decorators.
#[derive(Clone, Debug)]
pub struct HandlerFactory {
    options: Arc<Options>,
}

impl HandlerFactory {
    /// Creates a factory reading global decorators from `options`.
    pub fn new(options: Arc<Options>) -> Self {
        Self { options }
    }

    /// Shared options this factory reads from.
    pub fn options(&self) -> &Arc<Options> {
        &self.options
    }

    /// Builds the broadcast chain for `handler`.
    pub fn build<T>(&self, handler: Handler<T>, call_site: &[DecoratorRef<T>]) -> Handler<T>
    where
        T: Send + 'static,
    {
        let global = self.options.decorators::<T>();
        if global.is_empty() && call_site.is_empty() {
            return handler;
        }
        let chain = descending(global, call_site, |d| d.order());

        match handler {
            Handler::Sync(terminal) => {
                let mut next: SyncFn<T> = terminal;
                for d in chain {
                    let prev = next;
                    next = Arc::new(move |msg: &T| d.handle(msg, &prev));
                }
                Handler::Sync(next)
            }
            Handler::Async(terminal) => {
                let mut next: AsyncFn<T> = terminal;
                for d in chain {
                    let prev = next;
                    next = Arc::new(move |msg: T| {
                        let d = Arc::clone(&d);
                        let prev = Arc::clone(&prev);
                        async move { d.handle_async(msg, prev).await }.boxed()
                    });
                }
                Handler::Async(next)
            }
            Handler::AsyncCancelable(terminal) => {
                let mut next: CancelableFn<T> = terminal;
                for d in chain {
                    let prev = next;
                    next = Arc::new(move |msg: T, token: CancellationToken| {
                        let d = Arc::clone(&d);
                        let prev = Arc::clone(&prev);
                        async move { d.handle_cancelable(msg, token, prev).await }.boxed()
                    });
                }
                Handler::AsyncCancelable(next)
            }
        }
    }

    /// Builds the request chain for `handler`.
    pub fn build_request<T, R>(
        &self,
        handler: RequestHandler<T, R>,
        call_site: &[RequestDecoratorRef<T, R>],
    ) -> RequestHandler<T, R>
    where
        T: Send + 'static,
        R: Send + 'static,
    {
        let global = self.options.request_decorators::<T, R>();
        if global.is_empty() && call_site.is_empty() {
            return handler;
        }
        let chain = descending(global, call_site, |d| d.order());

        match handler {
            RequestHandler::Sync(terminal) => {
                let mut next: SyncRequestFn<T, R> = terminal;
                for d in chain {
                    let prev = next;
                    next = Arc::new(move |msg: &T| d.try_handle(msg, &prev));
                }
                RequestHandler::Sync(next)
            }
            RequestHandler::Async(terminal) => {
                let mut next: AsyncRequestFn<T, R> = terminal;
                for d in chain {
                    let prev = next;
                    next = Arc::new(move |msg: T| {
                        let d = Arc::clone(&d);
                        let prev = Arc::clone(&prev);
                        async move { d.try_handle_async(msg, prev).await }.boxed()
                    });
                }
                RequestHandler::Async(next)
            }
            RequestHandler::AsyncCancelable(terminal) => {
                let mut next: CancelableRequestFn<T, R> = terminal;
                for d in chain {
                    let prev = next;
                    next = Arc::new(move |msg: T, token: CancellationToken| {
                        let d = Arc::clone(&d);
                        let prev = Arc::clone(&prev);
                        async move { d.try_handle_cancelable(msg, token, prev).await }.boxed()
                    });
                }
                RequestHandler::AsyncCancelable(next)
            }
        }
    }
}

/// Concatenates `global ++ call_site` and stable-sorts by descending order.
fn descending<D: ?Sized>(
    mut all: Vec<Arc<D>>,
    call_site: &[Arc<D>],
    order: impl Fn(&D) -> i32,
) -> Vec<Arc<D>> {
    all.extend(call_site.iter().cloned());
    all.sort_by(|a, b| order(b).cmp(&order(a)));
    all
}
