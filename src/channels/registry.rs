//! # Handler registries.
//!
//! Shared storage behind every channel:
//! - [`Registry`]: one handler list (keyless channels)
//! - [`KeyedRegistry`]: one handler list per key (topics)
//!
//! ## Rules
//! - Every mutation (subscribe, unsubscribe, dispose) happens under the
//!   registry's single lock.
//! - Lists are copy-on-write `Arc<[Entry<H>]>`: publish clones the `Arc` under
//!   the lock and invokes handlers after releasing it. A handler added during
//!   a publish misses it; a handler removed during a publish still sees it.
//! - Removal is by [`SubscriptionId`], so equal handlers never alias.
//! - A topic partition exists only while it has handlers.

use std::collections::HashMap;
use std::hash::Hash;
use std::panic::Location;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::diagnostics::{DiagnosticsInfo, RegistryId, SubscriptionId};
use crate::disposables::Subscription;
use crate::error::ChannelError;
use crate::options::DisposedPolicy;

/// One registered handler.
#[derive(Clone)]
pub(crate) struct Entry<H> {
    pub(crate) id: SubscriptionId,
    pub(crate) handler: H,
}

/// Immutable view of a handler list taken by publish.
pub(crate) type Snapshot<H> = Arc<[Entry<H>]>;

struct HandlerList<H> {
    entries: Snapshot<H>,
}

impl<H: Clone> HandlerList<H> {
    fn new() -> Self {
        Self {
            entries: Arc::from(Vec::new()),
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    fn snapshot(&self) -> Snapshot<H> {
        Arc::clone(&self.entries)
    }

    fn push(&mut self, entry: Entry<H>) {
        let mut next = Vec::with_capacity(self.entries.len() + 1);
        next.extend(self.entries.iter().cloned());
        next.push(entry);
        self.entries = next.into();
    }

    fn remove(&mut self, id: SubscriptionId) -> bool {
        if !self.entries.iter().any(|e| e.id == id) {
            return false;
        }
        let next: Vec<Entry<H>> = self.entries.iter().filter(|e| e.id != id).cloned().collect();
        self.entries = next.into();
        true
    }

    fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries = Arc::from(Vec::new());
        removed
    }
}

/// Locked state of a keyless registry; `extra` is channel-specific data
/// that must change atomically with the handler list.
pub(crate) struct State<H, X> {
    handlers: HandlerList<H>,
    disposed: bool,
    pub(crate) extra: X,
}

impl<H: Clone, X> State<H, X> {
    #[inline]
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed
    }

    #[inline]
    pub(crate) fn snapshot(&self) -> Snapshot<H> {
        self.handlers.snapshot()
    }
}

/// Handler list of a keyless channel.
pub(crate) struct Registry<H, X = ()> {
    id: RegistryId,
    channel: &'static str,
    policy: DisposedPolicy,
    diagnostics: Arc<DiagnosticsInfo>,
    state: Mutex<State<H, X>>,
}

impl<H, X> Registry<H, X>
where
    H: Clone + Send + Sync + 'static,
    X: Send + 'static,
{
    pub(crate) fn new(
        channel: &'static str,
        policy: DisposedPolicy,
        diagnostics: Arc<DiagnosticsInfo>,
        extra: X,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: RegistryId::next(),
            channel,
            policy,
            diagnostics,
            state: Mutex::new(State {
                handlers: HandlerList::new(),
                disposed: false,
                extra,
            }),
        })
    }

    #[inline]
    pub(crate) fn lock(&self) -> MutexGuard<'_, State<H, X>> {
        self.state.lock()
    }

    pub(crate) fn subscribe(
        self: &Arc<Self>,
        handler: H,
        location: &'static Location<'static>,
    ) -> Result<Subscription, ChannelError> {
        let mut state = self.state.lock();
        self.register(&mut state, handler, location)
    }

    /// Adds `handler` while the caller already holds the lock.
    pub(crate) fn register(
        self: &Arc<Self>,
        state: &mut State<H, X>,
        handler: H,
        location: &'static Location<'static>,
    ) -> Result<Subscription, ChannelError> {
        if state.disposed {
            return self.policy.apply(self.channel);
        }
        let id = SubscriptionId::next();
        state.handlers.push(Entry { id, handler });
        self.diagnostics.increment(self.id, id, location);
        tracing::trace!(
            channel = self.channel,
            registry = self.id.get(),
            subscription = id.get(),
            "subscribed"
        );

        let weak = Arc::downgrade(self);
        Ok(Subscription::new(move || {
            if let Some(registry) = weak.upgrade() {
                registry.remove(id);
            }
        }))
    }

    #[inline]
    pub(crate) fn snapshot(&self) -> Snapshot<H> {
        self.state.lock().snapshot()
    }

    fn remove(&self, id: SubscriptionId) {
        let removed = self.state.lock().handlers.remove(id);
        if removed {
            self.diagnostics.decrement(self.id, id);
            tracing::trace!(
                channel = self.channel,
                registry = self.id.get(),
                subscription = id.get(),
                "unsubscribed"
            );
        }
    }

    /// Marks the registry closed and drops every handler. Returns `false`
    /// if it was already disposed.
    pub(crate) fn dispose(&self) -> bool {
        let removed = {
            let mut state = self.state.lock();
            if state.disposed {
                return false;
            }
            state.disposed = true;
            state.handlers.clear()
        };
        self.diagnostics.remove_target(self.id, removed);
        tracing::trace!(channel = self.channel, registry = self.id.get(), removed, "disposed");
        true
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    pub(crate) fn handler_count(&self) -> usize {
        self.state.lock().handlers.len()
    }
}

struct Partition<H> {
    id: RegistryId,
    handlers: HandlerList<H>,
}

struct KeyedState<K, H> {
    partitions: HashMap<K, Partition<H>>,
    disposed: bool,
}

/// Handler lists of a keyed channel, one partition per key.
pub(crate) struct KeyedRegistry<K, H> {
    channel: &'static str,
    policy: DisposedPolicy,
    diagnostics: Arc<DiagnosticsInfo>,
    state: Mutex<KeyedState<K, H>>,
}

impl<K, H> KeyedRegistry<K, H>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    H: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        channel: &'static str,
        policy: DisposedPolicy,
        diagnostics: Arc<DiagnosticsInfo>,
    ) -> Arc<Self> {
        Arc::new(Self {
            channel,
            policy,
            diagnostics,
            state: Mutex::new(KeyedState {
                partitions: HashMap::new(),
                disposed: false,
            }),
        })
    }

    pub(crate) fn subscribe(
        self: &Arc<Self>,
        key: K,
        handler: H,
        location: &'static Location<'static>,
    ) -> Result<Subscription, ChannelError> {
        let id = SubscriptionId::next();
        {
            let mut state = self.state.lock();
            if state.disposed {
                return self.policy.apply(self.channel);
            }
            let partition = state.partitions.entry(key.clone()).or_insert_with(|| {
                let id = RegistryId::next();
                tracing::debug!(channel = self.channel, registry = id.get(), "partition created");
                Partition {
                    id,
                    handlers: HandlerList::new(),
                }
            });
            partition.handlers.push(Entry { id, handler });
            self.diagnostics.increment(partition.id, id, location);
            tracing::trace!(
                channel = self.channel,
                registry = partition.id.get(),
                subscription = id.get(),
                "subscribed"
            );
        }

        let weak = Arc::downgrade(self);
        Ok(Subscription::new(move || {
            if let Some(registry) = weak.upgrade() {
                registry.remove(&key, id);
            }
        }))
    }

    /// Handlers registered under `key`, if any.
    pub(crate) fn snapshot(&self, key: &K) -> Option<Snapshot<H>> {
        let state = self.state.lock();
        state.partitions.get(key).map(|p| p.handlers.snapshot())
    }

    fn remove(&self, key: &K, id: SubscriptionId) {
        let mut state = self.state.lock();
        let Some(partition) = state.partitions.get_mut(key) else {
            return;
        };
        if !partition.handlers.remove(id) {
            return;
        }
        let registry = partition.id;
        let emptied = partition.handlers.is_empty();
        if emptied {
            state.partitions.remove(key);
        }
        drop(state);

        self.diagnostics.decrement(registry, id);
        tracing::trace!(
            channel = self.channel,
            registry = registry.get(),
            subscription = id.get(),
            "unsubscribed"
        );
        if emptied {
            tracing::debug!(channel = self.channel, registry = registry.get(), "partition removed");
        }
    }

    /// Closes the registry and drops every partition. Returns `false` if it
    /// was already disposed.
    pub(crate) fn dispose(&self) -> bool {
        let partitions = {
            let mut state = self.state.lock();
            if state.disposed {
                return false;
            }
            state.disposed = true;
            std::mem::take(&mut state.partitions)
        };
        for partition in partitions.into_values() {
            self.diagnostics
                .remove_target(partition.id, partition.handlers.len());
        }
        tracing::trace!(channel = self.channel, "disposed");
        true
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    pub(crate) fn keys(&self) -> Vec<K> {
        self.state.lock().partitions.keys().cloned().collect()
    }

    pub(crate) fn handler_count(&self, key: &K) -> usize {
        self.state
            .lock()
            .partitions
            .get(key)
            .map_or(0, |p| p.handlers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disposables::Dispose;
    use crate::options::Options;

    fn diagnostics() -> Arc<DiagnosticsInfo> {
        Arc::new(DiagnosticsInfo::new(Arc::new(Options::default())))
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_changes() {
        let diag = diagnostics();
        let reg: Arc<Registry<&'static str>> =
            Registry::new("Test", DisposedPolicy::Ignore, Arc::clone(&diag), ());
        let a = reg.subscribe("a", Location::caller()).unwrap();

        let before = reg.snapshot();
        let _b = reg.subscribe("b", Location::caller()).unwrap();
        a.dispose();

        assert_eq!(before.iter().map(|e| e.handler).collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(reg.snapshot().iter().map(|e| e.handler).collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(diag.subscription_count(), 1);
    }

    #[test]
    fn test_remove_by_identity_not_value() {
        let diag = diagnostics();
        let reg: Arc<Registry<u8>> = Registry::new("Test", DisposedPolicy::Ignore, Arc::clone(&diag), ());
        let first = reg.subscribe(7, Location::caller()).unwrap();
        let _second = reg.subscribe(7, Location::caller()).unwrap();

        first.dispose();
        first.dispose();
        assert_eq!(reg.handler_count(), 1);
        assert_eq!(diag.subscription_count(), 1);
    }

    #[test]
    fn test_dispose_is_idempotent_and_applies_policy() {
        let diag = diagnostics();
        let reg: Arc<Registry<u8>> = Registry::new("Test", DisposedPolicy::Throw, Arc::clone(&diag), ());
        let sub = reg.subscribe(1, Location::caller()).unwrap();
        let _ = reg.subscribe(2, Location::caller()).unwrap();

        assert!(reg.dispose());
        assert!(!reg.dispose());
        assert_eq!(diag.subscription_count(), 0);

        // late unsubscribe after dispose changes nothing
        sub.dispose();
        assert_eq!(diag.subscription_count(), 0);

        assert_eq!(
            reg.subscribe(3, Location::caller()).unwrap_err(),
            ChannelError::Disposed { channel: "Test" }
        );
    }

    #[test]
    fn test_keyed_partitions_are_collected_when_empty() {
        let diag = diagnostics();
        let reg: Arc<KeyedRegistry<&'static str, u8>> =
            KeyedRegistry::new("Test", DisposedPolicy::Ignore, Arc::clone(&diag));
        let a1 = reg.subscribe("a", 1, Location::caller()).unwrap();
        let a2 = reg.subscribe("a", 2, Location::caller()).unwrap();
        let _b = reg.subscribe("b", 3, Location::caller()).unwrap();
        assert_eq!(reg.handler_count(&"a"), 2);

        a1.dispose();
        assert_eq!(reg.keys().len(), 2);
        a2.dispose();
        assert!(reg.snapshot(&"a").is_none());
        assert_eq!(reg.keys(), vec!["b"]);
        assert_eq!(diag.subscription_count(), 1);

        let _a3 = reg.subscribe("a", 4, Location::caller()).unwrap();
        assert_eq!(reg.handler_count(&"a"), 1);
    }

    #[test]
    fn test_keyed_dispose_reports_every_partition() {
        let diag = diagnostics();
        let reg: Arc<KeyedRegistry<u8, u8>> =
            KeyedRegistry::new("Test", DisposedPolicy::Ignore, Arc::clone(&diag));
        for key in 0..3 {
            let _ = reg.subscribe(key, key, Location::caller()).unwrap();
        }
        assert_eq!(diag.subscription_count(), 3);

        assert!(reg.dispose());
        assert_eq!(diag.subscription_count(), 0);
        assert!(reg.keys().is_empty());

        let noop = reg.subscribe(9, 9, Location::caller()).unwrap();
        noop.dispose();
        assert!(reg.keys().is_empty());
    }
}
