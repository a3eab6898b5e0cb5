//! # Channels: typed dispatch points.
//!
//! - [`Event`] / [`EventBroker`]: keyless broadcast, with a replay buffer
//! - [`Topic`] / [`TopicBroker`]: broadcast partitioned by key
//! - [`Requester`] / [`EventRequester`]: keyless request/response, first answer wins
//! - [`TopicRequester`]: request/response partitioned by key
//! - [`EventFactory`]: builds channels sharing options and diagnostics
//! - [`MessageStream`]: one subscription read as an async stream
//!
//! ## Architecture
//! ```text
//! subscribe ──► HandlerFactory::build ──► lock ──► copy-on-write handler list += entry
//!                                                  DiagnosticsInfo::increment
//!           ◄── Subscription (weak ref + subscription id)
//!
//! publish   ──► lock ──► Arc snapshot ──► unlock ──► deliver (sync / async / request)
//! dispose   ──► lock ──► mark disposed, clear ──► unlock ──► DiagnosticsInfo::remove_target
//! ```
//!
//! ## Rules
//! - Publishing never iterates the live handler list; concurrent subscribe and
//!   unsubscribe affect the next publish only.
//! - Handlers are invoked with no channel lock held, so they may subscribe,
//!   unsubscribe, publish or dispose freely.
//! - Removal is by subscription identity, never by comparing handlers.
//! - Dispose is idempotent; subscribing afterwards follows
//!   [`DisposedPolicy`](crate::DisposedPolicy).

mod deliver;
mod event;
mod factory;
mod first;
mod publish;
mod registry;
mod requester;
mod stream;
mod topic;
mod topic_requester;

pub use event::{Event, EventBroker};
pub use factory::EventFactory;
pub use publish::PublishOptions;
pub use requester::{EventRequester, Requester};
pub use stream::MessageStream;
pub use topic::{Topic, TopicBroker};
pub use topic_requester::TopicRequester;
