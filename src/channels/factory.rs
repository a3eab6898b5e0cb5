//! # Channel factory.
//!
//! [`EventFactory`] bundles the three collaborators every channel needs and
//! hands out channels that share them.
//!
//! ```text
//! EventFactory
//!  ├─ Arc<Options>          strategy, disposed policy, replay capacity, global decorators
//!  ├─ Arc<HandlerFactory>   decorator chain composition
//!  └─ Arc<DiagnosticsInfo>  live subscription count and call sites
//!        │
//!        ├─► event::<T>()                     Event<T>
//!        ├─► topic::<K, T>()                  Topic<K, T>
//!        ├─► event_requester::<T, R>()        Requester<T, R>
//!        └─► topic_requester::<K, T, R>()     TopicRequester<K, T, R>
//! ```
//!
//! # Example
//! ```rust
//! use eventvisor::{EventFactory, Options, PublishStrategy};
//!
//! let mut options = Options::default();
//! options.default_publish_strategy = PublishStrategy::Sequential;
//! options.capture_stack_traces = true;
//!
//! let factory = EventFactory::with_options(options);
//! let names = factory.topic::<String, String>();
//! let _sub = names.subscribe_fn("greet".to_string(), |_| Ok(())).unwrap();
//!
//! assert_eq!(factory.diagnostics().subscription_count(), 1);
//! assert_eq!(factory.diagnostics().captured_stack_traces(true).len(), 1);
//! ```

use std::hash::Hash;
use std::sync::Arc;

use crate::channels::event::{Event, EventBroker};
use crate::channels::requester::{EventRequester, Requester};
use crate::channels::topic::{Topic, TopicBroker};
use crate::channels::topic_requester::TopicRequester;
use crate::diagnostics::DiagnosticsInfo;
use crate::handlers::HandlerFactory;
use crate::options::Options;

/// Creates channels that share options, decorator composition and diagnostics.
#[derive(Clone, Debug)]
pub struct EventFactory {
    options: Arc<Options>,
    handlers: Arc<HandlerFactory>,
    diagnostics: Arc<DiagnosticsInfo>,
}

impl EventFactory {
    /// Assembles a factory from explicit collaborators.
    ///
    /// `handlers` must be built from the same `options`: channels take their
    /// strategy, disposed policy and replay capacity from `handlers.options()`.
    /// Debug builds assert that both point at one allocation.
    pub fn new(
        options: Arc<Options>,
        handlers: Arc<HandlerFactory>,
        diagnostics: Arc<DiagnosticsInfo>,
    ) -> Self {
        debug_assert!(
            Arc::ptr_eq(&options, handlers.options()),
            "EventFactory::new: handlers were built from different options"
        );
        Self {
            options,
            handlers,
            diagnostics,
        }
    }

    /// Builds every collaborator from `options`.
    pub fn with_options(options: Options) -> Self {
        let options = Arc::new(options);
        let handlers = Arc::new(HandlerFactory::new(Arc::clone(&options)));
        let diagnostics = Arc::new(DiagnosticsInfo::new(Arc::clone(&options)));
        Self::new(options, handlers, diagnostics)
    }

    /// Shared options (register global decorators here).
    pub fn options(&self) -> &Arc<Options> {
        &self.options
    }

    /// Decorator composer used by every channel of this factory.
    pub fn handlers(&self) -> &Arc<HandlerFactory> {
        &self.handlers
    }

    /// Subscription bookkeeping for every channel of this factory.
    pub fn diagnostics(&self) -> &Arc<DiagnosticsInfo> {
        &self.diagnostics
    }

    /// New keyless event channel.
    pub fn event<T>(&self) -> Event<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        Event::new(Arc::clone(&self.handlers), Arc::clone(&self.diagnostics))
    }

    /// New keyed event channel.
    pub fn topic<K, T>(&self) -> Topic<K, T>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
    {
        Topic::new(Arc::clone(&self.handlers), Arc::clone(&self.diagnostics))
    }

    /// New keyless broadcast channel.
    pub fn event_broker<T>(&self) -> EventBroker<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.event()
    }

    /// New keyed broadcast channel.
    pub fn topic_broker<K, T>(&self) -> TopicBroker<K, T>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
    {
        self.topic()
    }

    /// New keyless request channel.
    pub fn event_requester<T, R>(&self) -> EventRequester<T, R>
    where
        T: Clone + Send + Sync + 'static,
        R: Send + 'static,
    {
        Requester::new(Arc::clone(&self.handlers), Arc::clone(&self.diagnostics))
    }

    /// New keyed request channel.
    pub fn topic_requester<K, T, R>(&self) -> TopicRequester<K, T, R>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
        R: Send + 'static,
    {
        TopicRequester::new(Arc::clone(&self.handlers), Arc::clone(&self.diagnostics))
    }
}

impl Default for EventFactory {
    fn default() -> Self {
        Self::with_options(Options::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disposables::Dispose;
    use crate::error::HandlerResult;
    use crate::handlers::{Decorator, Handler, SyncFn};
    use parking_lot::Mutex;

    struct Tag {
        order: i32,
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Decorator<u8> for Tag {
        fn order(&self) -> i32 {
            self.order
        }

        fn handle(&self, msg: &u8, next: &SyncFn<u8>) -> HandlerResult {
            self.log.lock().push(self.name);
            next(msg)
        }
    }

    struct Swallow;

    impl Decorator<u8> for Swallow {
        fn order(&self) -> i32 {
            0
        }

        fn handle(&self, _msg: &u8, _next: &SyncFn<u8>) -> HandlerResult {
            Ok(())
        }
    }

    #[test]
    fn test_channels_share_diagnostics() {
        let factory = EventFactory::default();
        let ev = factory.event::<u8>();
        let rq = factory.topic_requester::<u8, u8, u8>();
        let _a = ev.subscribe_fn(|_| Ok(())).unwrap();
        let _b = rq.subscribe_fn(1, |n| *n).unwrap();
        assert_eq!(factory.diagnostics().subscription_count(), 2);

        ev.dispose();
        rq.dispose();
        assert_eq!(factory.diagnostics().subscription_count(), 0);
    }

    #[test]
    fn test_global_and_call_site_decorators_order() {
        let factory = EventFactory::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        factory.options().register_decorator::<u8>(Arc::new(Tag {
            order: 10,
            name: "global",
            log: Arc::clone(&log),
        }));

        let ev = factory.event::<u8>();
        let l = Arc::clone(&log);
        let _sub = ev
            .subscribe_with(
                Handler::sync(move |_: &u8| {
                    l.lock().push("handler");
                    Ok(())
                }),
                &[Arc::new(Tag {
                    order: 1,
                    name: "call-site",
                    log: Arc::clone(&log),
                })],
            )
            .unwrap();

        ev.publish(&0).unwrap();
        assert_eq!(*log.lock(), vec!["call-site", "global", "handler"]);
    }

    #[test]
    fn test_decorator_can_short_circuit() {
        let factory = EventFactory::default();
        let ev = factory.event::<u8>();
        let hits = Arc::new(Mutex::new(0));
        let h = Arc::clone(&hits);
        let _sub = ev
            .subscribe_with(
                Handler::sync(move |_: &u8| {
                    *h.lock() += 1;
                    Ok(())
                }),
                &[Arc::new(Swallow)],
            )
            .unwrap();

        ev.publish(&1).unwrap();
        assert_eq!(*hits.lock(), 0);
    }

    #[test]
    fn test_global_decorator_only_affects_later_subscriptions() {
        let factory = EventFactory::default();
        let ev = factory.event::<u8>();
        let hits = Arc::new(Mutex::new(0));
        let h = Arc::clone(&hits);
        let _early = ev
            .subscribe_fn(move |_| {
                *h.lock() += 1;
                Ok(())
            })
            .unwrap();

        factory.options().register_decorator::<u8>(Arc::new(Swallow));
        let h = Arc::clone(&hits);
        let _late = ev
            .subscribe_fn(move |_| {
                *h.lock() += 1;
                Ok(())
            })
            .unwrap();

        ev.publish(&1).unwrap();
        assert_eq!(*hits.lock(), 1);
    }

    #[test]
    fn test_new_accepts_matching_options() {
        let mut options = Options::default();
        options.replay_capacity = 3;
        let options = Arc::new(options);
        let handlers = Arc::new(HandlerFactory::new(Arc::clone(&options)));
        let diagnostics = Arc::new(DiagnosticsInfo::new(Arc::clone(&options)));

        let factory = EventFactory::new(options, handlers, diagnostics);
        assert_eq!(factory.event::<u8>().replay_capacity(), 3);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "different options")]
    fn test_new_rejects_diverging_options() {
        let options = Arc::new(Options::default());
        let handlers = Arc::new(HandlerFactory::new(Arc::new(Options::default())));
        let diagnostics = Arc::new(DiagnosticsInfo::new(Arc::clone(&options)));
        let _ = EventFactory::new(options, handlers, diagnostics);
    }
}
