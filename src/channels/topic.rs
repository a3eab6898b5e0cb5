//! # Keyed broadcast channel (`Topic<K, T>`).
//!
//! Handlers subscribe under a key and only see messages published under an
//! equal key. Each key owns its own partition, created on first subscribe
//! and dropped when its last handler leaves.
//!
//! ```text
//! Topic
//!  ├─ "orders" ─► [h1, h2]
//!  └─ "users"  ─► [h3]
//!
//! publish("orders", m) ─► h1, h2
//! publish("audit",  m) ─► nobody (Ok)
//! ```
//!
//! Keyed channels have no replay buffer; `PublishOptions::buffered` is ignored.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::panic::Location;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::channels::deliver;
use crate::channels::first;
use crate::channels::publish::PublishOptions;
use crate::channels::registry::KeyedRegistry;
use crate::channels::stream::{self, MessageStream};
use crate::diagnostics::DiagnosticsInfo;
use crate::disposables::{Dispose, DisposeOnDrop, SingleAssignment, Subscription};
use crate::error::{ChannelError, HandlerError, HandlerResult};
use crate::handlers::{DecoratorRef, Filter, Handler, HandlerFactory};

const CHANNEL: &str = "Topic";

/// Keyed broadcast channel.
pub struct Topic<K, T> {
    registry: Arc<KeyedRegistry<K, Handler<T>>>,
    handlers: Arc<HandlerFactory>,
}

/// Broadcast-only name for [`Topic`].
pub type TopicBroker<K, T> = Topic<K, T>;

impl<K, T> Topic<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(handlers: Arc<HandlerFactory>, diagnostics: Arc<DiagnosticsInfo>) -> Self {
        let policy = handlers.options().disposed_policy;
        Self {
            registry: KeyedRegistry::new(CHANNEL, policy, diagnostics),
            handlers,
        }
    }

    /// Subscribes `handler` under `key`.
    #[track_caller]
    pub fn subscribe(&self, key: K, handler: Handler<T>) -> Result<Subscription, ChannelError> {
        self.subscribe_with(key, handler, &[])
    }

    /// Subscribes `handler` under `key`, wrapped in call-site `decorators`.
    #[track_caller]
    pub fn subscribe_with(
        &self,
        key: K,
        handler: Handler<T>,
        decorators: &[DecoratorRef<T>],
    ) -> Result<Subscription, ChannelError> {
        let location = Location::caller();
        let composed = self.handlers.build(handler, decorators);
        self.registry.subscribe(key, composed, location)
    }

    /// Subscribes a synchronous closure under `key`.
    #[track_caller]
    pub fn subscribe_fn<F>(&self, key: K, f: F) -> Result<Subscription, ChannelError>
    where
        F: Fn(&T) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe_with(key, Handler::sync(f), &[])
    }

    /// Subscribes `handler` under `key` behind a [`Filter`].
    #[track_caller]
    pub fn subscribe_filtered<P>(
        &self,
        key: K,
        handler: Handler<T>,
        predicate: P,
    ) -> Result<Subscription, ChannelError>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.subscribe_with(key, handler, &[Filter::arc(predicate)])
    }

    /// Delivers `msg` to the handlers under `key`. A key nobody listens on is `Ok`.
    pub fn publish(&self, key: &K, msg: &T) -> HandlerResult {
        match self.registry.snapshot(key) {
            Some(snapshot) => deliver::broadcast(&snapshot, msg, CHANNEL),
            None => Ok(()),
        }
    }

    /// Delivers `msg` under `key` and awaits every handler.
    pub async fn publish_async(&self, key: &K, msg: T) -> HandlerResult {
        self.publish_async_with(key, msg, PublishOptions::default()).await
    }

    /// Delivers `msg` under `key` and awaits every handler with `opts`.
    pub async fn publish_async_with(&self, key: &K, msg: T, opts: PublishOptions) -> HandlerResult {
        let Some(snapshot) = self.registry.snapshot(key) else {
            return Ok(());
        };
        let strategy = opts.strategy_or(self.handlers.options().default_publish_strategy);
        deliver::broadcast_async(&snapshot, &msg, strategy, opts.token.as_ref(), CHANNEL).await
    }

    /// Waits for the next message published under `key`.
    #[track_caller]
    pub fn first(
        &self,
        key: K,
    ) -> Result<impl Future<Output = Result<T, HandlerError>> + Send + 'static, ChannelError> {
        self.first_with(key, |_| true, None)
    }

    /// Waits for the next message under `key` matching `predicate`.
    ///
    /// Dropping the future before it resolves unsubscribes, and the partition
    /// goes away with its last handler.
    #[track_caller]
    pub fn first_with<P>(
        &self,
        key: K,
        predicate: P,
        token: Option<CancellationToken>,
    ) -> Result<impl Future<Output = Result<T, HandlerError>> + Send + 'static, ChannelError>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.first_with_decorators(key, predicate, &[], token)
    }

    /// Like [`first_with`](Self::first_with), with call-site `decorators`
    /// running after the predicate.
    #[track_caller]
    pub fn first_with_decorators<P>(
        &self,
        key: K,
        predicate: P,
        decorators: &[DecoratorRef<T>],
        token: Option<CancellationToken>,
    ) -> Result<impl Future<Output = Result<T, HandlerError>> + Send + 'static, ChannelError>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let mut chain: Vec<DecoratorRef<T>> = Vec::with_capacity(decorators.len() + 1);
        chain.push(Filter::arc(predicate));
        chain.extend(decorators.iter().cloned());

        let guard = Arc::new(SingleAssignment::new());
        let (handler, rx) = first::capture(&guard);
        let sub = self.subscribe_with(key, handler, &chain)?;
        guard.set(sub)?;
        Ok(first::wait(rx, DisposeOnDrop::new(guard), token))
    }

    /// Subscribes under `key` and yields every later message as a [`MessageStream`].
    ///
    /// Dropping the stream unsubscribes. Disposing the channel ends it.
    #[track_caller]
    pub fn stream(
        &self,
        key: K,
        decorators: &[DecoratorRef<T>],
    ) -> Result<MessageStream<T>, ChannelError> {
        let holder = Arc::new(SingleAssignment::new());
        let capacity = self.handlers.options().stream_capacity_clamped();
        let (handler, rx) = stream::feed(capacity, CHANNEL);
        let sub = self.subscribe_with(key, handler, decorators)?;
        holder.set(sub)?;
        Ok(MessageStream::new(rx, holder))
    }

    /// Keys that currently have at least one handler, in no particular order.
    pub fn keys(&self) -> Vec<K> {
        self.registry.keys()
    }

    /// True if `key` has at least one handler.
    pub fn contains_key(&self, key: &K) -> bool {
        self.registry.handler_count(key) > 0
    }

    /// Number of handlers under `key`.
    pub fn handler_count(&self, key: &K) -> usize {
        self.registry.handler_count(key)
    }

    /// True once [`dispose`](Dispose::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.registry.is_disposed()
    }
}

impl<K, T> Dispose for Topic<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn dispose(&self) {
        self.registry.dispose();
    }
}

impl<K, T> Clone for Topic<K, T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            handlers: Arc::clone(&self.handlers),
        }
    }
}

impl<K, T> fmt::Debug for Topic<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{DisposedPolicy, Options};
    use parking_lot::Mutex;

    fn topic_with<K>(options: Options) -> (Topic<K, u32>, Arc<DiagnosticsInfo>)
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
    {
        let options = Arc::new(options);
        let diagnostics = Arc::new(DiagnosticsInfo::new(Arc::clone(&options)));
        let handlers = Arc::new(HandlerFactory::new(options));
        (Topic::new(handlers, Arc::clone(&diagnostics)), diagnostics)
    }

    fn topic() -> Topic<&'static str, u32> {
        topic_with(Options::default()).0
    }

    #[test]
    fn test_publish_reaches_only_matching_key() {
        let t = topic();
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (Arc::clone(&log), Arc::clone(&log));
        let _x = t
            .subscribe_fn("x", move |n| {
                a.lock().push(("x", *n));
                Ok(())
            })
            .unwrap();
        let _y = t
            .subscribe_fn("y", move |n| {
                b.lock().push(("y", *n));
                Ok(())
            })
            .unwrap();

        t.publish(&"x", &1).unwrap();
        t.publish(&"z", &2).unwrap();
        assert_eq!(*log.lock(), vec![("x", 1)]);
    }

    #[test]
    fn test_key_disappears_with_last_handler() {
        let t = topic();
        let a = t.subscribe_fn("k", |_| Ok(())).unwrap();
        let b = t.subscribe_fn("k", |_| Ok(())).unwrap();
        assert!(t.contains_key(&"k"));
        assert_eq!(t.handler_count(&"k"), 2);

        a.dispose();
        assert!(t.contains_key(&"k"));
        b.dispose();
        assert!(!t.contains_key(&"k"));
        assert!(t.keys().is_empty());

        let _c = t.subscribe_fn("k", |_| Ok(())).unwrap();
        assert_eq!(t.keys(), vec!["k"]);
    }

    #[tokio::test]
    async fn test_publish_async_unknown_key_is_ok() {
        let t = topic();
        assert_eq!(t.publish_async(&"nobody", 1).await, Ok(()));
    }

    #[tokio::test]
    async fn test_first_under_key() {
        let t = topic();
        let next = t.first("k").unwrap();
        t.publish(&"other", &1).unwrap();
        t.publish(&"k", &2).unwrap();
        assert_eq!(next.await, Ok(2));
        assert!(!t.contains_key(&"k"));
    }

    #[tokio::test]
    async fn test_dropped_first_future_releases_partition() {
        let (t, diag) = topic_with::<u32>(Options::default());
        for k in 0..100 {
            drop(t.first(k).unwrap());
        }
        assert!(t.keys().is_empty());
        assert_eq!(t.handler_count(&7), 0);
        assert_eq!(diag.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_first_with_decorators_under_key() {
        struct Double;

        impl crate::handlers::Decorator<u32> for Double {
            fn handle(&self, msg: &u32, next: &crate::handlers::SyncFn<u32>) -> HandlerResult {
                next(&(msg * 2))
            }
        }

        let t = topic();
        let next = t
            .first_with_decorators("k", |n| *n >= 3, &[Arc::new(Double)], None)
            .unwrap();
        t.publish(&"k", &1).unwrap();
        t.publish(&"k", &3).unwrap();
        assert_eq!(next.await, Ok(6));
        assert!(t.keys().is_empty());
    }

    #[tokio::test]
    async fn test_stream_under_key_until_dropped() {
        use futures::StreamExt;

        let t = topic();
        let mut messages = t.stream("k", &[]).unwrap();
        t.publish(&"k", &1).unwrap();
        t.publish(&"other", &9).unwrap();
        t.publish(&"k", &2).unwrap();
        assert_eq!(messages.next().await, Some(1));
        assert_eq!(messages.next().await, Some(2));

        drop(messages);
        assert!(t.keys().is_empty());
    }

    #[test]
    fn test_dispose_drops_all_partitions() {
        let mut opts = Options::default();
        opts.disposed_policy = DisposedPolicy::Throw;
        let (t, diag) = topic_with(opts);
        let _a = t.subscribe_fn("a", |_| Ok(())).unwrap();
        let _b = t.subscribe_fn("b", |_| Ok(())).unwrap();
        assert_eq!(diag.subscription_count(), 2);

        t.dispose();
        t.dispose();
        assert!(t.keys().is_empty());
        assert_eq!(diag.subscription_count(), 0);
        assert_eq!(
            t.subscribe_fn("a", |_| Ok(())).unwrap_err(),
            ChannelError::Disposed { channel: "Topic" }
        );
    }
}
