//! # Publish and lifecycle policies.
//!
//! - [`PublishStrategy`]: fan-out vs. one-by-one await for async publishes.
//! - [`DisposedPolicy`]: what subscribing to a disposed channel does.

use crate::disposables::Subscription;
use crate::error::ChannelError;

/// How async publishes deliver to more than one handler.
///
/// With zero or one handler both strategies behave the same.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PublishStrategy {
    /// Start every handler, then await them together (fail fast on first error).
    ///
    /// Start order is registration order; completion order is unspecified.
    #[default]
    Parallel,

    /// Await each handler before starting the next, in registration order.
    Sequential,
}

/// Behavior of `subscribe` on a channel that has been disposed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DisposedPolicy {
    /// Return a no-op [`Subscription`]; the handler is never called.
    #[default]
    Ignore,

    /// Fail with [`ChannelError::Disposed`].
    Throw,
}

impl DisposedPolicy {
    /// Applies the policy for a channel named `channel`.
    pub(crate) fn apply(self, channel: &'static str) -> Result<Subscription, ChannelError> {
        match self {
            DisposedPolicy::Ignore => Ok(Subscription::noop()),
            DisposedPolicy::Throw => Err(ChannelError::Disposed { channel }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disposables::Dispose;

    #[test]
    fn test_defaults() {
        assert_eq!(PublishStrategy::default(), PublishStrategy::Parallel);
        assert_eq!(DisposedPolicy::default(), DisposedPolicy::Ignore);
    }

    #[test]
    fn test_apply() {
        let sub = DisposedPolicy::Ignore.apply("Event").unwrap();
        sub.dispose();
        assert!(sub.is_disposed());

        assert_eq!(
            DisposedPolicy::Throw.apply("Event").unwrap_err(),
            ChannelError::Disposed { channel: "Event" }
        );
    }
}
