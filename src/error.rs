//! Error types used by channels and handlers.
//!
//! This module defines two main error enums:
//!
//! - [`ChannelError`]: errors raised by the dispatch core itself
//!   (subscribing to a disposed channel, misuse of disposables, queue bounds).
//! - [`HandlerError`]: errors raised by handlers and decorators while a
//!   message is being delivered.
//!
//! Both types provide `as_label` for logs/metrics.

use std::fmt::Display;

use thiserror::Error;

/// Result type returned by broadcast handler shapes.
pub type HandlerResult = Result<(), HandlerError>;

/// Result type returned by request handler shapes.
///
/// `Ok(Some(r))` means the handler produced `r`; `Ok(None)` means it declined.
pub type RequestResult<R> = Result<Option<R>, HandlerError>;

/// # Errors produced by the dispatch core.
///
/// These represent misuse of, or races with, the channel lifecycle.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Subscribe was called on a channel that has already been disposed and
    /// [`DisposedPolicy::Throw`](crate::DisposedPolicy::Throw) is configured.
    #[error("cannot subscribe: {channel} is disposed")]
    Disposed {
        /// Channel type name (e.g. `"Event"`, `"Topic"`).
        channel: &'static str,
    },

    /// A second disposable was assigned into a [`SingleAssignment`](crate::SingleAssignment).
    #[error("single-assignment disposable is already assigned")]
    AlreadyAssigned,

    /// Enqueue on a full fixed-capacity queue.
    #[error("queue is full (capacity {capacity})")]
    QueueFull {
        /// Capacity of the queue at the time of the call.
        capacity: usize,
    },

    /// Dequeue on an empty fixed-capacity queue.
    #[error("queue is empty")]
    QueueEmpty,

    /// A handler failed while replaying buffered messages to a new subscriber.
    ///
    /// The subscription was not registered.
    #[error("replay failed: {source}")]
    Replay {
        /// Error returned by the subscribing handler.
        source: HandlerError,
    },

    /// The process-wide default factory was initialized twice.
    #[error("default event factory is already initialized")]
    AlreadyInitialized,
}

impl ChannelError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use eventvisor::ChannelError;
    ///
    /// let err = ChannelError::Disposed { channel: "Event" };
    /// assert_eq!(err.as_label(), "channel_disposed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ChannelError::Disposed { .. } => "channel_disposed",
            ChannelError::AlreadyAssigned => "disposable_already_assigned",
            ChannelError::QueueFull { .. } => "queue_full",
            ChannelError::QueueEmpty => "queue_empty",
            ChannelError::Replay { .. } => "replay_failed",
            ChannelError::AlreadyInitialized => "factory_already_initialized",
        }
    }
}

/// # Errors produced while delivering a message.
///
/// Handler and decorator failures are never swallowed by the core: they reach
/// the publisher synchronously (sync handlers) or through the returned future.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Handler or decorator failed.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The handler observed cancellation, or a pending wait was cancelled.
    #[error("handler cancelled")]
    Canceled,
}

impl HandlerError {
    /// Builds a [`HandlerError::Fail`] from anything printable.
    ///
    /// # Example
    /// ```
    /// use eventvisor::HandlerError;
    ///
    /// let err = HandlerError::fail("boom");
    /// assert_eq!(err.to_string(), "handler failed: boom");
    /// ```
    pub fn fail(error: impl Display) -> Self {
        HandlerError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Canceled => "handler_canceled",
        }
    }

    /// True for [`HandlerError::Canceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, HandlerError::Canceled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_error_labels() {
        assert_eq!(
            ChannelError::QueueFull { capacity: 4 }.as_label(),
            "queue_full"
        );
        assert_eq!(ChannelError::QueueEmpty.as_label(), "queue_empty");
        assert_eq!(
            ChannelError::AlreadyAssigned.as_label(),
            "disposable_already_assigned"
        );
    }

    #[test]
    fn test_disposed_message_names_channel() {
        let err = ChannelError::Disposed { channel: "Topic" };
        assert_eq!(err.to_string(), "cannot subscribe: Topic is disposed");
    }

    #[test]
    fn test_handler_error_helpers() {
        let err = HandlerError::fail(format!("code {}", 7));
        assert_eq!(err, HandlerError::Fail { error: "code 7".into() });
        assert!(!err.is_canceled());
        assert!(HandlerError::Canceled.is_canceled());
        assert_eq!(HandlerError::Canceled.as_label(), "handler_canceled");
    }
}
