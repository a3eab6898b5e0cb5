//! Per-call options for awaited publishes.

use tokio_util::sync::CancellationToken;

use crate::options::PublishStrategy;

/// Options for `publish_async_with` / `try_publish_async_with`.
///
/// ## Field semantics
/// - `strategy`: `None` uses [`Options::default_publish_strategy`](crate::Options::default_publish_strategy)
/// - `buffered`: also store the message in the replay buffer (keyless events only)
/// - `token`: `None` means the caller did not ask for cancellation; cancelable
///   handlers then get a token that is never cancelled
///
/// # Example
/// ```
/// use eventvisor::{PublishOptions, PublishStrategy};
/// use tokio_util::sync::CancellationToken;
///
/// let opts = PublishOptions::new()
///     .strategy(PublishStrategy::Sequential)
///     .token(CancellationToken::new());
/// assert!(opts.token.is_some());
/// ```
#[derive(Clone, Debug, Default)]
pub struct PublishOptions {
    /// Strategy override.
    pub strategy: Option<PublishStrategy>,
    /// Store into the replay buffer before delivering.
    pub buffered: bool,
    /// Cancellation threaded to cancelable handlers.
    pub token: Option<CancellationToken>,
}

impl PublishOptions {
    /// Defaults: configured strategy, not buffered, no token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the strategy.
    pub fn strategy(mut self, strategy: PublishStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Stores the message in the replay buffer as well.
    pub fn buffered(mut self) -> Self {
        self.buffered = true;
        self
    }

    /// Threads `token` to cancelable handlers.
    pub fn token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    #[inline]
    pub(crate) fn strategy_or(&self, default: PublishStrategy) -> PublishStrategy {
        self.strategy.unwrap_or(default)
    }
}
