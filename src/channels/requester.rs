//! # Keyless request channel (`Requester<T, R>`).
//!
//! Handlers answer a message with `Ok(Some(r))`, decline with `Ok(None)`, or
//! fail with `Err`. The channel returns the first answer in registration
//! order, or every answer with the `_all` forms.
//!
//! ```text
//! try_publish(msg)
//!   h1 → Ok(None)      declined, keep going
//!   h2 → Ok(Some(r))   winner, h3 is not called
//!   h3
//!
//! try_publish_all(msg, &mut out)
//!   h1 → None, h2 → Some(a), h3 → Some(b)   ⇒ out = [a, b], true
//! ```
//!
//! ## Rules
//! - An error from any invoked handler stops the publish and is returned.
//! - The synchronous forms never wait: an async handler still pending after
//!   its first poll keeps running detached and counts as declined.
//! - With [`PublishStrategy::Parallel`](crate::PublishStrategy::Parallel) every
//!   handler runs; the winner is still chosen by registration order.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use crate::channels::deliver;
use crate::channels::publish::PublishOptions;
use crate::channels::registry::Registry;
use crate::diagnostics::DiagnosticsInfo;
use crate::disposables::{Dispose, Subscription};
use crate::error::{ChannelError, HandlerError, RequestResult};
use crate::handlers::{Filter, HandlerFactory, RequestDecoratorRef, RequestHandler};

const CHANNEL: &str = "Requester";

/// Keyless request/response channel.
pub struct Requester<T, R> {
    registry: Arc<Registry<RequestHandler<T, R>>>,
    handlers: Arc<HandlerFactory>,
}

/// Factory-facing name for [`Requester`].
pub type EventRequester<T, R> = Requester<T, R>;

impl<T, R> Requester<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    pub(crate) fn new(handlers: Arc<HandlerFactory>, diagnostics: Arc<DiagnosticsInfo>) -> Self {
        let policy = handlers.options().disposed_policy;
        Self {
            registry: Registry::new(CHANNEL, policy, diagnostics, ()),
            handlers,
        }
    }

    /// Subscribes a responder.
    #[track_caller]
    pub fn subscribe(&self, handler: RequestHandler<T, R>) -> Result<Subscription, ChannelError> {
        self.subscribe_with(handler, &[])
    }

    /// Subscribes a responder wrapped in call-site `decorators`.
    #[track_caller]
    pub fn subscribe_with(
        &self,
        handler: RequestHandler<T, R>,
        decorators: &[RequestDecoratorRef<T, R>],
    ) -> Result<Subscription, ChannelError> {
        let location = Location::caller();
        let composed = self.handlers.build_request(handler, decorators);
        self.registry.subscribe(composed, location)
    }

    /// Subscribes an infallible closure that always answers.
    #[track_caller]
    pub fn subscribe_fn<F>(&self, f: F) -> Result<Subscription, ChannelError>
    where
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        self.subscribe_with(RequestHandler::from_fn(f), &[])
    }

    /// Subscribes a responder that only sees messages matching `predicate`.
    #[track_caller]
    pub fn subscribe_filtered<P>(
        &self,
        handler: RequestHandler<T, R>,
        predicate: P,
    ) -> Result<Subscription, ChannelError>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.subscribe_with(handler, &[Filter::arc(predicate)])
    }

    /// First answer in registration order, without waiting.
    pub fn try_publish(&self, msg: &T) -> RequestResult<R> {
        let snapshot = self.registry.snapshot();
        Ok(deliver::request(&snapshot, msg, false, CHANNEL)?.pop())
    }

    /// Clears `out`, then appends every answer in registration order.
    /// Returns whether anything answered.
    pub fn try_publish_all(&self, msg: &T, out: &mut Vec<R>) -> Result<bool, HandlerError> {
        out.clear();
        let snapshot = self.registry.snapshot();
        out.extend(deliver::request(&snapshot, msg, true, CHANNEL)?);
        Ok(!out.is_empty())
    }

    /// First answer, awaiting handlers with the configured default strategy.
    pub async fn try_publish_async(&self, msg: T) -> RequestResult<R> {
        self.try_publish_async_with(msg, PublishOptions::default()).await
    }

    /// First answer, awaiting handlers with `opts`.
    pub async fn try_publish_async_with(&self, msg: T, opts: PublishOptions) -> RequestResult<R> {
        let snapshot = self.registry.snapshot();
        let strategy = opts.strategy_or(self.handlers.options().default_publish_strategy);
        let mut values = deliver::request_async(
            &snapshot,
            &msg,
            false,
            strategy,
            opts.token.as_ref(),
            CHANNEL,
        )
        .await?;
        Ok(values.pop())
    }

    /// Every answer, awaiting handlers with the configured default strategy.
    pub async fn try_publish_all_async(&self, msg: T, out: &mut Vec<R>) -> Result<bool, HandlerError> {
        self.try_publish_all_async_with(msg, PublishOptions::default(), out)
            .await
    }

    /// Every answer, awaiting handlers with `opts`. `out` is cleared first.
    pub async fn try_publish_all_async_with(
        &self,
        msg: T,
        opts: PublishOptions,
        out: &mut Vec<R>,
    ) -> Result<bool, HandlerError> {
        out.clear();
        let snapshot = self.registry.snapshot();
        let strategy = opts.strategy_or(self.handlers.options().default_publish_strategy);
        let values = deliver::request_async(
            &snapshot,
            &msg,
            true,
            strategy,
            opts.token.as_ref(),
            CHANNEL,
        )
        .await?;
        out.extend(values);
        Ok(!out.is_empty())
    }

    /// Number of live responders.
    pub fn handler_count(&self) -> usize {
        self.registry.handler_count()
    }

    /// True once [`dispose`](Dispose::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.registry.is_disposed()
    }
}

impl<T, R> Dispose for Requester<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    fn dispose(&self) {
        self.registry.dispose();
    }
}

impl<T, R> Clone for Requester<T, R> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            handlers: Arc::clone(&self.handlers),
        }
    }
}

impl<T, R> fmt::Debug for Requester<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requester").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Options, PublishStrategy};
    use std::time::Duration;

    fn requester() -> Requester<i32, i32> {
        let options = Arc::new(Options::default());
        let diagnostics = Arc::new(DiagnosticsInfo::new(Arc::clone(&options)));
        Requester::new(Arc::new(HandlerFactory::new(options)), diagnostics)
    }

    fn decline() -> RequestHandler<i32, i32> {
        RequestHandler::sync(|_: &i32| Ok(None))
    }

    #[test]
    fn test_first_answer_wins_in_registration_order() {
        let rq = requester();
        let _a = rq.subscribe(decline()).unwrap();
        let _b = rq.subscribe_fn(|n| n + 1).unwrap();
        let _c = rq.subscribe_fn(|n| n + 2).unwrap();

        assert_eq!(rq.try_publish(&10), Ok(Some(11)));

        let mut out = vec![99];
        assert_eq!(rq.try_publish_all(&10, &mut out), Ok(true));
        assert_eq!(out, vec![11, 12]);
    }

    #[test]
    fn test_no_responder_is_none() {
        let rq = requester();
        assert_eq!(rq.try_publish(&1), Ok(None));

        let _a = rq.subscribe(decline()).unwrap();
        let mut out = vec![5];
        assert_eq!(rq.try_publish_all(&1, &mut out), Ok(false));
        assert!(out.is_empty());
    }

    #[test]
    fn test_error_stops_request() {
        let rq = requester();
        let _a = rq
            .subscribe(RequestHandler::sync(|_: &i32| Err(HandlerError::fail("nope"))))
            .unwrap();
        let _b = rq.subscribe_fn(|n| *n).unwrap();
        assert_eq!(rq.try_publish(&1), Err(HandlerError::fail("nope")));
    }

    #[test]
    fn test_ready_async_answers_sync_publish() {
        let rq = requester();
        let _a = rq
            .subscribe(RequestHandler::async_fn(|n: i32| async move { Ok(Some(n * 3)) }))
            .unwrap();
        assert_eq!(rq.try_publish(&2), Ok(Some(6)));
    }

    #[tokio::test]
    async fn test_pending_async_counts_as_declined_in_sync_publish() {
        let rq = requester();
        let _a = rq
            .subscribe(RequestHandler::async_fn(|n: i32| async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                Ok(Some(n))
            }))
            .unwrap();
        let _b = rq.subscribe_fn(|n| n * 10).unwrap();
        assert_eq!(rq.try_publish(&2), Ok(Some(20)));
    }

    #[tokio::test]
    async fn test_parallel_collects_by_index() {
        let rq = requester();
        let mut subs = Vec::new();
        for (i, delay) in [30u64, 1, 15].into_iter().enumerate() {
            subs.push(
                rq.subscribe(RequestHandler::async_fn(move |_: i32| async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Ok(Some(i as i32))
                }))
                .unwrap(),
            );
        }

        let mut out = Vec::new();
        assert_eq!(rq.try_publish_all_async(0, &mut out).await, Ok(true));
        assert_eq!(out, vec![0, 1, 2]);
        assert_eq!(rq.try_publish_async(0).await, Ok(Some(0)));
    }

    #[tokio::test]
    async fn test_sequential_stops_at_first_answer() {
        let rq = requester();
        let _a = rq.subscribe(decline()).unwrap();
        let _b = rq.subscribe_fn(|n| n + 1).unwrap();
        let _c = rq
            .subscribe(RequestHandler::sync(|_: &i32| Err(HandlerError::fail("not reached"))))
            .unwrap();

        let opts = PublishOptions::new().strategy(PublishStrategy::Sequential);
        assert_eq!(rq.try_publish_async_with(1, opts).await, Ok(Some(2)));
    }

    #[test]
    fn test_filtered_responder() {
        let rq = requester();
        let _a = rq
            .subscribe_filtered(RequestHandler::from_fn(|n: &i32| n * 2), |n| *n > 0)
            .unwrap();
        assert_eq!(rq.try_publish(&-1), Ok(None));
        assert_eq!(rq.try_publish(&4), Ok(Some(8)));
    }
}
