//! # Live-subscription diagnostics.
//!
//! [`DiagnosticsInfo`] is shared by every channel of one factory. It keeps:
//! - an aggregate live-subscription count
//! - a dirty flag, set on every add/remove
//! - when [`Options::capture_stack_traces`](crate::Options::capture_stack_traces)
//!   is on, one [`StackTraceInfo`] per live subscription, grouped by registry
//!
//! ```text
//! subscribe   ──► increment(registry, sub)   count += 1, capture call site
//! unsubscribe ──► decrement(registry, sub)   count -= 1, forget capture
//! dispose     ──► remove_target(registry, n) count -= n, forget registry
//! inspector   ──► captured_stack_traces / grouped_by_caller / check_and_reset_dirty
//! ```
//!
//! The map has its own lock; it never contends with a channel's publish path.

use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::fmt;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::diagnostics::ids::{RegistryId, SubscriptionId};
use crate::options::Options;

/// Captured context of one `subscribe` call.
#[derive(Clone)]
pub struct StackTraceInfo {
    subscription: SubscriptionId,
    registry: RegistryId,
    timestamp: SystemTime,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
    head: String,
}

impl StackTraceInfo {
    fn capture(
        registry: RegistryId,
        subscription: SubscriptionId,
        location: &'static Location<'static>,
    ) -> Self {
        Self {
            subscription,
            registry,
            timestamp: SystemTime::now(),
            location,
            backtrace: Arc::new(Backtrace::force_capture()),
            head: format!("{}:{}:{}", location.file(), location.line(), location.column()),
        }
    }

    /// Subscription this capture belongs to; ids grow with subscribe order.
    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// Registry the subscription was added to.
    pub fn registry(&self) -> RegistryId {
        self.registry
    }

    /// Wall-clock time of the subscribe call.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Source location of the caller of `subscribe`.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Full backtrace taken at subscribe time.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Grouping label: `file:line:column` of the first caller outside this crate.
    pub fn head(&self) -> &str {
        &self.head
    }
}

impl fmt::Debug for StackTraceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackTraceInfo")
            .field("subscription", &self.subscription)
            .field("registry", &self.registry)
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

/// Diagnostics of live subscriptions for one factory.
pub struct DiagnosticsInfo {
    options: Arc<Options>,
    count: AtomicUsize,
    dirty: AtomicBool,
    captured: Mutex<HashMap<RegistryId, HashMap<SubscriptionId, StackTraceInfo>>>,
}

impl DiagnosticsInfo {
    /// Creates empty diagnostics reading the capture toggle from `options`.
    pub fn new(options: Arc<Options>) -> Self {
        Self {
            options,
            count: AtomicUsize::new(0),
            dirty: AtomicBool::new(false),
            captured: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live subscriptions across all channels.
    #[inline]
    pub fn subscription_count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Returns whether anything changed since the previous call, and resets the flag.
    #[inline]
    pub fn check_and_reset_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// All captured traces, ordered by subscription id.
    ///
    /// Empty when capture is disabled.
    pub fn captured_stack_traces(&self, ascending: bool) -> Vec<StackTraceInfo> {
        if !self.options.capture_stack_traces {
            return Vec::new();
        }
        let mut all: Vec<StackTraceInfo> = {
            let captured = self.captured.lock();
            captured.values().flat_map(|m| m.values().cloned()).collect()
        };
        all.sort_by_key(|info| info.subscription);
        if !ascending {
            all.reverse();
        }
        all
    }

    /// Captured traces grouped by [`StackTraceInfo::head`].
    ///
    /// Groups appear in order of their first member; members keep the
    /// requested subscription-id order.
    pub fn grouped_by_caller(&self, ascending: bool) -> Vec<(String, Vec<StackTraceInfo>)> {
        let mut groups: Vec<(String, Vec<StackTraceInfo>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for info in self.captured_stack_traces(ascending) {
            match index.get(info.head()) {
                Some(&i) => groups[i].1.push(info),
                None => {
                    index.insert(info.head.clone(), groups.len());
                    groups.push((info.head.clone(), vec![info]));
                }
            }
        }
        groups
    }

    /// Records a new subscription made from `location`.
    pub(crate) fn increment(
        &self,
        registry: RegistryId,
        subscription: SubscriptionId,
        location: &'static Location<'static>,
    ) {
        self.count.fetch_add(1, Ordering::AcqRel);
        if self.options.capture_stack_traces {
            let info = StackTraceInfo::capture(registry, subscription, location);
            self.captured
                .lock()
                .entry(registry)
                .or_default()
                .insert(subscription, info);
        }
        self.dirty.store(true, Ordering::Release);
    }

    pub(crate) fn decrement(&self, registry: RegistryId, subscription: SubscriptionId) {
        self.sub_count(1);
        if self.options.capture_stack_traces {
            let mut captured = self.captured.lock();
            if let Some(map) = captured.get_mut(&registry) {
                map.remove(&subscription);
                if map.is_empty() {
                    captured.remove(&registry);
                }
            }
        }
        self.dirty.store(true, Ordering::Release);
    }

    pub(crate) fn remove_target(&self, registry: RegistryId, removed: usize) {
        self.sub_count(removed);
        if self.options.capture_stack_traces {
            self.captured.lock().remove(&registry);
        }
        self.dirty.store(true, Ordering::Release);
    }

    fn sub_count(&self, n: usize) {
        let _ = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some(c.saturating_sub(n)));
    }
}

impl fmt::Debug for DiagnosticsInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticsInfo")
            .field("subscription_count", &self.subscription_count())
            .field("capture_stack_traces", &self.options.capture_stack_traces)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capturing() -> DiagnosticsInfo {
        let mut opts = Options::default();
        opts.capture_stack_traces = true;
        DiagnosticsInfo::new(Arc::new(opts))
    }

    #[test]
    fn test_count_and_dirty() {
        let diag = DiagnosticsInfo::new(Arc::new(Options::default()));
        let reg = RegistryId::next();
        let sub = SubscriptionId::next();

        assert!(!diag.check_and_reset_dirty());
        diag.increment(reg, sub, Location::caller());
        assert_eq!(diag.subscription_count(), 1);
        assert!(diag.check_and_reset_dirty());
        assert!(!diag.check_and_reset_dirty());

        diag.decrement(reg, sub);
        assert_eq!(diag.subscription_count(), 0);
        assert!(diag.captured_stack_traces(true).is_empty());
    }

    #[test]
    fn test_captures_call_site() {
        let diag = capturing();
        let reg = RegistryId::next();
        let (a, b) = (SubscriptionId::next(), SubscriptionId::next());
        diag.increment(reg, a, Location::caller());
        diag.increment(reg, b, Location::caller());

        let asc = diag.captured_stack_traces(true);
        assert_eq!(asc.len(), 2);
        assert_eq!(asc[0].subscription(), a);
        assert_eq!(asc[0].location().file(), file!());
        assert!(asc[0].head().starts_with(file!()));

        let desc = diag.captured_stack_traces(false);
        assert_eq!(desc[0].subscription(), b);

        diag.decrement(reg, a);
        assert_eq!(diag.captured_stack_traces(true).len(), 1);
    }

    #[test]
    fn test_grouped_by_caller() {
        let diag = capturing();
        let reg = RegistryId::next();
        for _ in 0..3 {
            diag.increment(reg, SubscriptionId::next(), Location::caller());
        }
        diag.increment(reg, SubscriptionId::next(), Location::caller());

        let groups = diag.grouped_by_caller(true);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].1.len(), 3);
        assert_eq!(groups[1].1.len(), 1);
    }

    #[test]
    fn test_remove_target() {
        let diag = capturing();
        let (r1, r2) = (RegistryId::next(), RegistryId::next());
        diag.increment(r1, SubscriptionId::next(), Location::caller());
        diag.increment(r1, SubscriptionId::next(), Location::caller());
        diag.increment(r2, SubscriptionId::next(), Location::caller());

        diag.remove_target(r1, 2);
        assert_eq!(diag.subscription_count(), 1);
        let left = diag.captured_stack_traces(true);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].registry(), r2);
    }
}
