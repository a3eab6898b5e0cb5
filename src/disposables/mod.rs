//! # Disposables.
//!
//! - [`Subscription`] membership of one handler in one channel
//! - [`DisposableBag`] dispose many things at once
//! - [`SingleAssignment`] assign-once holder
//!
//! All of them are idempotent: the second `dispose` does nothing.

mod bag;
mod subscription;

pub(crate) use bag::DisposeOnDrop;
pub use bag::{DisposableBag, SingleAssignment};
pub use subscription::Subscription;

/// Something that can be released exactly once.
pub trait Dispose: Send + Sync {
    /// Releases the resource. Repeated calls are no-ops.
    fn dispose(&self);
}
