//! # Subscription handle.
//!
//! A [`Subscription`] represents one handler's membership in one channel.
//! [`dispose`](Dispose::dispose) removes the handler; calling it again is a no-op.
//!
//! ## Rules
//! - Dropping a subscription does **not** unsubscribe.
//! - The handle keeps only a weak link to its channel, so a live
//!   subscription never keeps a dropped channel alive.
//! - Removal takes effect for the next publish; a publish that already took
//!   its snapshot still reaches the handler.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::disposables::Dispose;

type Detach = Box<dyn FnOnce() + Send + Sync>;

/// Disposable membership of one handler in one channel.
#[must_use = "dropping a Subscription does not unsubscribe; call dispose()"]
pub struct Subscription {
    detach: Mutex<Option<Detach>>,
    disposed: AtomicBool,
}

impl Subscription {
    pub(crate) fn new<F>(detach: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            detach: Mutex::new(Some(Box::new(detach))),
            disposed: AtomicBool::new(false),
        }
    }

    /// A subscription attached to nothing.
    ///
    /// Returned when subscribing to a disposed channel under
    /// [`DisposedPolicy::Ignore`](crate::DisposedPolicy::Ignore).
    pub fn noop() -> Self {
        Self {
            detach: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    /// True once [`dispose`](Dispose::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Dispose for Subscription {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let detach = self.detach.lock().take();
        if let Some(detach) = detach {
            detach();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_dispose_runs_detach_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let sub = Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!sub.is_disposed());
        sub.dispose();
        sub.dispose();
        assert!(sub.is_disposed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_does_not_detach() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        drop(Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
