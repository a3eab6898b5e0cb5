//! # Shared configuration.
//!
//! Provides [`Options`], the settings every channel spawned from one
//! [`EventFactory`](crate::EventFactory) reads from.
//!
//! Options are used in three places:
//! 1. **Publish**: `default_publish_strategy` when the caller does not pick one
//! 2. **Subscribe**: `disposed_policy`, and `capture_stack_traces` for diagnostics
//! 3. **Composition**: globally registered decorators, per message type
//!
//! Plain fields are set before the options are shared; decorator registration
//! is the only mutation allowed afterwards.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use eventvisor::{DisposedPolicy, Filter, Options, PublishStrategy};
//!
//! let mut opts = Options::default();
//! opts.default_publish_strategy = PublishStrategy::Sequential;
//! opts.disposed_policy = DisposedPolicy::Throw;
//! opts.capture_stack_traces = true;
//!
//! let opts = Arc::new(opts);
//! opts.register_decorator::<u64>(Filter::arc(|n: &u64| *n != 0));
//! assert_eq!(opts.decorator_count(), 1);
//! ```

use std::fmt;

use crate::handlers::{DecoratorRef, RequestDecoratorRef};
use crate::options::policy::{DisposedPolicy, PublishStrategy};
use crate::options::registry::DecoratorRegistry;

/// Configuration shared by all channels of one factory.
///
/// ## Field semantics
/// - `default_publish_strategy`: used by `publish_async` / `try_publish_async` without an explicit strategy
/// - `capture_stack_traces`: record the subscribe call site (and a backtrace) per subscription
/// - `disposed_policy`: subscribe-after-dispose behavior
/// - `replay_capacity`: capacity of each keyless event's replay buffer (min 1)
/// - `stream_capacity`: unread messages each [`MessageStream`](crate::MessageStream) holds (min 1)
pub struct Options {
    /// Strategy for async publishes that do not specify one.
    pub default_publish_strategy: PublishStrategy,

    /// Capture call-site information for every subscription.
    ///
    /// Costs one backtrace capture per subscribe; keep disabled in production.
    pub capture_stack_traces: bool,

    /// What subscribing to a disposed channel does.
    pub disposed_policy: DisposedPolicy,

    /// Capacity of each keyless event's replay buffer.
    ///
    /// When full, buffering a new message evicts the oldest one.
    pub replay_capacity: usize,

    /// Unread messages a [`MessageStream`](crate::MessageStream) holds.
    ///
    /// When full, newly published messages are dropped for that stream.
    pub stream_capacity: usize,

    decorators: DecoratorRegistry,
}

impl Options {
    /// Registers a decorator applied to every broadcast subscription for `T`.
    ///
    /// Only subscriptions made after registration see it.
    pub fn register_decorator<T: Send + 'static>(&self, decorator: DecoratorRef<T>) {
        self.decorators.add(decorator);
    }

    /// Registers a decorator applied to every request subscription for `(T, R)`.
    pub fn register_request_decorator<T: Send + 'static, R: Send + 'static>(
        &self,
        decorator: RequestDecoratorRef<T, R>,
    ) {
        self.decorators.add_request(decorator);
    }

    /// Number of globally registered decorators (all types).
    pub fn decorator_count(&self) -> usize {
        self.decorators.len()
    }

    /// Returns the replay capacity clamped to a minimum of 1.
    #[inline]
    pub fn replay_capacity_clamped(&self) -> usize {
        self.replay_capacity.max(1)
    }

    /// Returns the stream capacity clamped to a minimum of 1.
    #[inline]
    pub fn stream_capacity_clamped(&self) -> usize {
        self.stream_capacity.max(1)
    }

    pub(crate) fn decorators<T: Send + 'static>(&self) -> Vec<DecoratorRef<T>> {
        self.decorators.get::<T>()
    }

    pub(crate) fn request_decorators<T: Send + 'static, R: Send + 'static>(
        &self,
    ) -> Vec<RequestDecoratorRef<T, R>> {
        self.decorators.get_request::<T, R>()
    }
}

impl Default for Options {
    /// Default configuration:
    ///
    /// - `default_publish_strategy = Parallel`
    /// - `capture_stack_traces = false`
    /// - `disposed_policy = Ignore`
    /// - `replay_capacity = 1024`
    /// - `stream_capacity = 1024`
    fn default() -> Self {
        Self {
            default_publish_strategy: PublishStrategy::default(),
            capture_stack_traces: false,
            disposed_policy: DisposedPolicy::default(),
            replay_capacity: 1024,
            stream_capacity: 1024,
            decorators: DecoratorRegistry::default(),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("default_publish_strategy", &self.default_publish_strategy)
            .field("capture_stack_traces", &self.capture_stack_traces)
            .field("disposed_policy", &self.disposed_policy)
            .field("replay_capacity", &self.replay_capacity)
            .field("stream_capacity", &self.stream_capacity)
            .field("decorators", &self.decorators.len())
            .finish()
    }
}
