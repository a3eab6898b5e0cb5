//! # Keyed request channel (`TopicRequester<K, T, R>`).
//!
//! Same answer rules as [`Requester`](crate::Requester), with responders
//! partitioned by key like [`Topic`](crate::Topic). A key without responders
//! yields `Ok(None)` / `Ok(false)`.

use std::fmt;
use std::hash::Hash;
use std::panic::Location;
use std::sync::Arc;

use crate::channels::deliver;
use crate::channels::publish::PublishOptions;
use crate::channels::registry::KeyedRegistry;
use crate::diagnostics::DiagnosticsInfo;
use crate::disposables::{Dispose, Subscription};
use crate::error::{ChannelError, HandlerError, RequestResult};
use crate::handlers::{Filter, HandlerFactory, RequestDecoratorRef, RequestHandler};

const CHANNEL: &str = "TopicRequester";

/// Keyed request/response channel.
pub struct TopicRequester<K, T, R> {
    registry: Arc<KeyedRegistry<K, RequestHandler<T, R>>>,
    handlers: Arc<HandlerFactory>,
}

impl<K, T, R> TopicRequester<K, T, R>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    pub(crate) fn new(handlers: Arc<HandlerFactory>, diagnostics: Arc<DiagnosticsInfo>) -> Self {
        let policy = handlers.options().disposed_policy;
        Self {
            registry: KeyedRegistry::new(CHANNEL, policy, diagnostics),
            handlers,
        }
    }

    /// Subscribes a responder under `key`.
    #[track_caller]
    pub fn subscribe(
        &self,
        key: K,
        handler: RequestHandler<T, R>,
    ) -> Result<Subscription, ChannelError> {
        self.subscribe_with(key, handler, &[])
    }

    /// Subscribes a responder under `key`, wrapped in call-site `decorators`.
    #[track_caller]
    pub fn subscribe_with(
        &self,
        key: K,
        handler: RequestHandler<T, R>,
        decorators: &[RequestDecoratorRef<T, R>],
    ) -> Result<Subscription, ChannelError> {
        let location = Location::caller();
        let composed = self.handlers.build_request(handler, decorators);
        self.registry.subscribe(key, composed, location)
    }

    /// Subscribes an infallible closure under `key`.
    #[track_caller]
    pub fn subscribe_fn<F>(&self, key: K, f: F) -> Result<Subscription, ChannelError>
    where
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        self.subscribe_with(key, RequestHandler::from_fn(f), &[])
    }

    /// Subscribes a responder under `key` behind a [`Filter`].
    #[track_caller]
    pub fn subscribe_filtered<P>(
        &self,
        key: K,
        handler: RequestHandler<T, R>,
        predicate: P,
    ) -> Result<Subscription, ChannelError>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.subscribe_with(key, handler, &[Filter::arc(predicate)])
    }

    /// First answer under `key`, without waiting.
    pub fn try_publish(&self, key: &K, msg: &T) -> RequestResult<R> {
        let Some(snapshot) = self.registry.snapshot(key) else {
            return Ok(None);
        };
        Ok(deliver::request(&snapshot, msg, false, CHANNEL)?.pop())
    }

    /// Clears `out`, then appends every answer under `key`.
    pub fn try_publish_all(&self, key: &K, msg: &T, out: &mut Vec<R>) -> Result<bool, HandlerError> {
        out.clear();
        if let Some(snapshot) = self.registry.snapshot(key) {
            out.extend(deliver::request(&snapshot, msg, true, CHANNEL)?);
        }
        Ok(!out.is_empty())
    }

    /// First answer under `key`, awaiting handlers with the default strategy.
    pub async fn try_publish_async(&self, key: &K, msg: T) -> RequestResult<R> {
        self.try_publish_async_with(key, msg, PublishOptions::default())
            .await
    }

    /// First answer under `key`, awaiting handlers with `opts`.
    pub async fn try_publish_async_with(
        &self,
        key: &K,
        msg: T,
        opts: PublishOptions,
    ) -> RequestResult<R> {
        let Some(snapshot) = self.registry.snapshot(key) else {
            return Ok(None);
        };
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

    /// Every answer under `key`, awaiting handlers with the default strategy.
    pub async fn try_publish_all_async(
        &self,
        key: &K,
        msg: T,
        out: &mut Vec<R>,
    ) -> Result<bool, HandlerError> {
        self.try_publish_all_async_with(key, msg, PublishOptions::default(), out)
            .await
    }

    /// Every answer under `key`, awaiting handlers with `opts`.
    pub async fn try_publish_all_async_with(
        &self,
        key: &K,
        msg: T,
        opts: PublishOptions,
        out: &mut Vec<R>,
    ) -> Result<bool, HandlerError> {
        out.clear();
        let Some(snapshot) = self.registry.snapshot(key) else {
            return Ok(false);
        };
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

    /// Keys that currently have at least one responder.
    pub fn keys(&self) -> Vec<K> {
        self.registry.keys()
    }

    /// True if `key` has at least one responder.
    pub fn contains_key(&self, key: &K) -> bool {
        self.registry.handler_count(key) > 0
    }

    /// Number of responders under `key`.
    pub fn handler_count(&self, key: &K) -> usize {
        self.registry.handler_count(key)
    }

    /// True once [`dispose`](Dispose::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.registry.is_disposed()
    }
}

impl<K, T, R> Dispose for TopicRequester<K, T, R>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    fn dispose(&self) {
        self.registry.dispose();
    }
}

impl<K, T, R> Clone for TopicRequester<K, T, R> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            handlers: Arc::clone(&self.handlers),
        }
    }
}

impl<K, T, R> fmt::Debug for TopicRequester<K, T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicRequester").finish_non_exhaustive()
    }
}
