//! # Keyless broadcast channel (`Event<T>`).
//!
//! Every subscriber receives every published message. The channel also keeps
//! a bounded replay buffer: messages published with `buffered` are stored,
//! and a subscriber that opts in drains them when it joins.
//!
//! ## Architecture
//! ```text
//! publish(msg) ──► lock ─► snapshot ─► unlock ──► sync handlers inline
//!                                                └─► async handlers started, not awaited
//! publish_async(msg) ──► snapshot ──► Sequential: one by one
//!                                 └─► Parallel:   WhenAll (fail fast)
//! publish_buffered(msg) ──► lock ─► replay.push(msg) + snapshot ─► unlock ─► deliver
//! subscribe_buffered(h) ──► lock ─► replay empty? register : drain ─► unlock ─► deliver batch ─► retry
//! ```
//!
//! ## Rules
//! - Handlers added during a publish do not see it.
//! - A replaying subscriber sees each buffered message once, then live messages.
//! - Replay drains the buffer: the next replaying subscriber starts from what
//!   was buffered after that.
//! - When the buffer is full the oldest message is evicted.
//!
//! ## Example
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use eventvisor::{Dispose, EventFactory};
//!
//! let factory = EventFactory::default();
//! let numbers = factory.event::<i32>();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let s = Arc::clone(&seen);
//! let sub = numbers
//!     .subscribe_fn(move |n| {
//!         s.lock().unwrap().push(n * 2);
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! numbers.publish(&5).unwrap();
//! sub.dispose();
//! numbers.publish(&5).unwrap();
//! assert_eq!(*seen.lock().unwrap(), vec![10]);
//! ```

use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::channels::deliver;
use crate::channels::first;
use crate::channels::publish::PublishOptions;
use crate::channels::registry::{Registry, Snapshot};
use crate::channels::stream::{self, MessageStream};
use crate::diagnostics::DiagnosticsInfo;
use crate::dispatch::{fire_and_forget, Invocation};
use crate::disposables::{Dispose, DisposeOnDrop, SingleAssignment, Subscription};
use crate::error::{ChannelError, HandlerError, HandlerResult};
use crate::handlers::{DecoratorRef, Filter, Handler, HandlerFactory};
use crate::internal::FixedQueue;
use crate::options::Options;

const CHANNEL: &str = "Event";

/// Keyless broadcast channel.
///
/// Cloning is cheap and yields another handle to the same channel.
pub struct Event<T> {
    registry: Arc<Registry<Handler<T>, FixedQueue<T>>>,
    handlers: Arc<HandlerFactory>,
}

/// Broadcast-only name for [`Event`].
pub type EventBroker<T> = Event<T>;

impl<T> Event<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(handlers: Arc<HandlerFactory>, diagnostics: Arc<DiagnosticsInfo>) -> Self {
        let options = handlers.options();
        let replay = FixedQueue::with_capacity(options.replay_capacity_clamped());
        let registry = Registry::new(CHANNEL, options.disposed_policy, diagnostics, replay);
        Self { registry, handlers }
    }

    #[inline]
    fn options(&self) -> &Options {
        self.handlers.options()
    }

    /// Subscribes `handler` with the global decorators for `T`.
    #[track_caller]
    pub fn subscribe(&self, handler: Handler<T>) -> Result<Subscription, ChannelError> {
        self.subscribe_with(handler, &[])
    }

    /// Subscribes `handler` wrapped in call-site `decorators` (plus global ones).
    #[track_caller]
    pub fn subscribe_with(
        &self,
        handler: Handler<T>,
        decorators: &[DecoratorRef<T>],
    ) -> Result<Subscription, ChannelError> {
        let location = Location::caller();
        let composed = self.handlers.build(handler, decorators);
        self.registry.subscribe(composed, location)
    }

    /// Subscribes a synchronous closure.
    #[track_caller]
    pub fn subscribe_fn<F>(&self, f: F) -> Result<Subscription, ChannelError>
    where
        F: Fn(&T) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe_with(Handler::sync(f), &[])
    }

    /// Subscribes `handler` behind a [`Filter`].
    #[track_caller]
    pub fn subscribe_filtered<P>(
        &self,
        handler: Handler<T>,
        predicate: P,
    ) -> Result<Subscription, ChannelError>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.subscribe_with(handler, &[Filter::arc(predicate)])
    }

    /// Subscribes after replaying the buffered messages into the new handler.
    ///
    /// Replay goes through the composed handler. Sync handlers run inline;
    /// async ones are started without being awaited (use
    /// [`subscribe_buffered_async`](Self::subscribe_buffered_async) to await them).
    ///
    /// # Errors
    /// [`ChannelError::Replay`] if the handler fails on a replayed message.
    /// The subscription is then not registered and the rest of that batch is lost.
    #[track_caller]
    pub fn subscribe_buffered(
        &self,
        handler: Handler<T>,
        decorators: &[DecoratorRef<T>],
    ) -> Result<Subscription, ChannelError> {
        let location = Location::caller();
        let composed = self.handlers.build(handler, decorators);
        loop {
            let batch = {
                let mut state = self.registry.lock();
                if state.is_disposed() || state.extra.is_empty() {
                    return self.registry.register(&mut state, composed, location);
                }
                state.extra.drain()
            };
            for msg in &batch {
                match composed.invoke(msg, None) {
                    Invocation::Done(res) => res.map_err(|source| ChannelError::Replay { source })?,
                    Invocation::Started(fut) => fire_and_forget(fut, CHANNEL),
                }
            }
        }
    }

    /// Like [`subscribe_buffered`](Self::subscribe_buffered), but awaits each
    /// replayed message in order before registering.
    ///
    /// `token` is handed to cancelable handlers for every replayed message.
    /// The call site is recorded when this is called, not when it is awaited.
    #[track_caller]
    pub fn subscribe_buffered_async(
        &self,
        handler: Handler<T>,
        decorators: &[DecoratorRef<T>],
        token: Option<CancellationToken>,
    ) -> impl Future<Output = Result<Subscription, ChannelError>> + Send + '_ {
        let location = Location::caller();
        let composed = self.handlers.build(handler, decorators);
        async move {
            loop {
                let batch = {
                    let mut state = self.registry.lock();
                    if state.is_disposed() || state.extra.is_empty() {
                        return self.registry.register(&mut state, composed, location);
                    }
                    state.extra.drain()
                };
                for msg in &batch {
                    composed
                        .invoke(msg, token.as_ref())
                        .resolve()
                        .await
                        .map_err(|source| ChannelError::Replay { source })?;
                }
            }
        }
    }

    /// Delivers `msg` to every handler.
    ///
    /// Sync handlers run on this stack and the first error is returned.
    /// Async handlers are started and left running: their failures never
    /// reach the caller and are only logged. Use
    /// [`publish_async`](Self::publish_async) to observe them.
    pub fn publish(&self, msg: &T) -> HandlerResult {
        let snapshot = self.registry.snapshot();
        deliver::broadcast(&snapshot, msg, CHANNEL)
    }

    /// Stores `msg` in the replay buffer, then delivers it like [`publish`](Self::publish).
    pub fn publish_buffered(&self, msg: &T) -> HandlerResult {
        let snapshot = self.buffer_and_snapshot(msg);
        deliver::broadcast(&snapshot, msg, CHANNEL)
    }

    /// Delivers `msg` and awaits every handler with the configured default strategy.
    pub async fn publish_async(&self, msg: T) -> HandlerResult {
        self.publish_async_with(msg, PublishOptions::default()).await
    }

    /// Delivers `msg` and awaits every handler.
    pub async fn publish_async_with(&self, msg: T, opts: PublishOptions) -> HandlerResult {
        let snapshot = if opts.buffered {
            self.buffer_and_snapshot(&msg)
        } else {
            self.registry.snapshot()
        };
        let strategy = opts.strategy_or(self.options().default_publish_strategy);
        deliver::broadcast_async(&snapshot, &msg, strategy, opts.token.as_ref(), CHANNEL).await
    }

    /// Waits for the next published message.
    ///
    /// Subscribes immediately; the returned future resolves with the first
    /// message delivered after this call.
    #[track_caller]
    pub fn first(
        &self,
    ) -> Result<impl Future<Output = Result<T, HandlerError>> + Send + 'static, ChannelError> {
        self.first_with(|_| true, None)
    }

    /// Waits for the next message matching `predicate`.
    ///
    /// Cancelling `token`, or disposing the channel, resolves the future with
    /// [`HandlerError::Canceled`]. The internal subscription is removed in
    /// every case, including when the future is dropped before completing.
    #[track_caller]
    pub fn first_with<P>(
        &self,
        predicate: P,
        token: Option<CancellationToken>,
    ) -> Result<impl Future<Output = Result<T, HandlerError>> + Send + 'static, ChannelError>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.first_with_decorators(predicate, &[], token)
    }

    /// Like [`first_with`](Self::first_with), with call-site `decorators`
    /// running after the predicate.
    #[track_caller]
    pub fn first_with_decorators<P>(
        &self,
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
        let sub = self.subscribe_with(handler, &chain)?;
        guard.set(sub)?;
        Ok(first::wait(rx, DisposeOnDrop::new(guard), token))
    }

    /// Subscribes and yields every later message as a [`MessageStream`].
    ///
    /// Dropping the stream unsubscribes. Disposing the channel ends it.
    /// Messages beyond [`Options::stream_capacity`] unread ones are dropped.
    #[track_caller]
    pub fn stream(
        &self,
        decorators: &[DecoratorRef<T>],
    ) -> Result<MessageStream<T>, ChannelError> {
        let holder = Arc::new(SingleAssignment::new());
        let (handler, rx) = stream::feed(self.options().stream_capacity_clamped(), CHANNEL);
        let sub = self.subscribe_with(handler, decorators)?;
        holder.set(sub)?;
        Ok(MessageStream::new(rx, holder))
    }

    /// Number of buffered messages waiting for a replaying subscriber.
    pub fn buffered_len(&self) -> usize {
        self.registry.lock().extra.len()
    }

    /// Current capacity of the replay buffer.
    pub fn replay_capacity(&self) -> usize {
        self.registry.lock().extra.capacity()
    }

    /// Resizes the replay buffer, keeping buffered messages in order.
    ///
    /// # Errors
    /// [`ChannelError::QueueFull`] if more than `capacity` messages are buffered.
    pub fn resize_replay(&self, capacity: usize) -> Result<(), ChannelError> {
        self.registry.lock().extra.ensure_capacity(capacity.max(1))
    }

    /// Number of live subscriptions.
    pub fn handler_count(&self) -> usize {
        self.registry.handler_count()
    }

    /// True once [`dispose`](Dispose::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.registry.is_disposed()
    }

    fn buffer_and_snapshot(&self, msg: &T) -> Snapshot<Handler<T>> {
        let mut state = self.registry.lock();
        if !state.is_disposed() && state.extra.push_evict(msg.clone()).is_some() {
            tracing::trace!(channel = CHANNEL, "replay buffer full, oldest message evicted");
        }
        state.snapshot()
    }
}

impl<T> Dispose for Event<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Drops every handler and buffered message; later subscribes follow
    /// [`DisposedPolicy`](crate::DisposedPolicy).
    fn dispose(&self) {
        if self.registry.dispose() {
            let dropped = self.registry.lock().extra.drain();
            drop(dropped);
        }
    }
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            handlers: Arc::clone(&self.handlers),
        }
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event").finish_non_exhaustive()
    }
}
