//! # eventvisor
//!
//! **Eventvisor** is an in-process, typed event bus for Rust.
//!
//! It provides keyless event channels, keyed topic channels, broadcast and
//! request/response semantics, each usable synchronously or awaited, with
//! ordered middleware around every handler and live introspection of who is
//! subscribed where.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   Handler    │   │   Handler    │   │RequestHandler│
//!     │    (sync)    │   │   (async)    │   │ (cancelable) │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  HandlerFactory (decorator chain composition)                     │
//! │  - global decorators from Options (per message / result type)     │
//! │  - call-site decorators (Filter, user middleware)                 │
//! │  - one chain per handler shape                                    │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               ▼
//!     ┌──────────┐   ┌────────────┐   ┌────────────┐   ┌────────────────┐
//!     │ Event<T> │   │ Topic<K,T> │   │Requester<T,│   │TopicRequester< │
//!     │ + replay │   │ partitions │   │     R>     │   │    K,T,R>      │
//!     └────┬─────┘   └─────┬──────┘   └─────┬──────┘   └───────┬────────┘
//!          │ copy-on-write handler snapshots (lock released before delivery)
//!          ▼               ▼                ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  dispatch                                                         │
//! │  - sync: inline, first error propagates                           │
//! │  - Sequential: await each handler in registration order           │
//! │  - Parallel: WhenAll (pooled awaiter nodes, fail fast)            │
//! └───────────────────────────────────────────────────────────────────┘
//!          │
//!          ▼
//!   DiagnosticsInfo (subscription count, dirty flag, call sites)
//! ```
//!
//! ### Subscription lifecycle
//! ```text
//! subscribe(handler) ──► compose ──► lock ──► disposed?
//!                                              ├─ yes ─► DisposedPolicy: noop Subscription | ChannelError::Disposed
//!                                              └─ no  ─► push entry, diagnostics += 1
//!                    ◄── Subscription
//!
//! Subscription::dispose() ──► remove by id (once) ──► diagnostics -= 1
//!                                                    └─ topic: empty partition removed
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                         |
//! |-------------------|---------------------------------------------------------------|--------------------------------------------|
//! | **Channels**      | Keyless and keyed broadcast / request channels.               | [`Event`], [`Topic`], [`Requester`], [`TopicRequester`] |
//! | **Handlers**      | Sync, async and cancelable call shapes.                       | [`Handler`], [`RequestHandler`], [`Shape`] |
//! | **Middleware**    | Ordered decorators, global or per subscription.               | [`Decorator`], [`RequestDecorator`], [`Filter`] |
//! | **Dispatch**      | Sequential or parallel awaited publishes.                     | [`PublishStrategy`], [`PublishOptions`]    |
//! | **Lifecycle**     | Disposable subscriptions and helpers.                         | [`Subscription`], [`Dispose`], [`DisposableBag`] |
//! | **Diagnostics**   | Live subscription count and captured call sites.              | [`DiagnosticsInfo`], [`StackTraceInfo`]    |
//! | **Errors**        | Typed errors for channels and handlers.                       | [`ChannelError`], [`HandlerError`]         |
//! | **Configuration** | Shared settings and global decorators.                        | [`Options`], [`EventFactory`]              |
//!
//! ## Optional features
//! - `global`: exposes the process-wide default factory in [`global`].
//!
//! ## Example
//! ```rust
//! use eventvisor::{EventFactory, Handler, HandlerError, PublishOptions, PublishStrategy};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let factory = EventFactory::default();
//!     let orders = factory.event::<u32>();
//!
//!     let _audit = orders.subscribe_fn(|id| {
//!         println!("order {id}");
//!         Ok(())
//!     })?;
//!     let _check = orders.subscribe(Handler::async_fn(|id: u32| async move {
//!         if id == 0 {
//!             return Err(HandlerError::fail("order id must be set"));
//!         }
//!         Ok(())
//!     }))?;
//!
//!     orders.publish_async(7).await?;
//!
//!     let opts = PublishOptions::new().strategy(PublishStrategy::Sequential);
//!     assert!(orders.publish_async_with(0, opts).await.is_err());
//!
//!     let prices = factory.topic_requester::<&'static str, u32, u32>();
//!     let _eur = prices.subscribe_fn("eur", |cents| cents * 92 / 100)?;
//!     assert_eq!(prices.try_publish(&"eur", &100)?, Some(92));
//!     assert_eq!(prices.try_publish(&"gbp", &100)?, None);
//!     Ok(())
//! }
//! ```
mod channels;
mod diagnostics;
mod dispatch;
mod disposables;
mod error;
mod handlers;
mod internal;
mod options;

// ---- Public re-exports ----

pub use channels::{
    Event, EventBroker, EventFactory, EventRequester, MessageStream, PublishOptions, Requester,
    Topic, TopicBroker, TopicRequester,
};
pub use diagnostics::{DiagnosticsInfo, RegistryId, StackTraceInfo, SubscriptionId};
pub use disposables::{DisposableBag, Dispose, SingleAssignment, Subscription};
pub use error::{ChannelError, HandlerError, HandlerResult, RequestResult};
pub use handlers::{
    AsyncFn, AsyncRequestFn, CancelableFn, CancelableRequestFn, Decorator, DecoratorRef, Filter,
    Handler, HandlerFactory, RequestDecorator, RequestDecoratorRef, RequestHandler, Shape, SyncFn,
    SyncRequestFn,
};
pub use options::{DisposedPolicy, Options, PublishStrategy};

// Optional: process-wide default factory.
// Enable with: `--features global`
#[cfg(feature = "global")]
pub mod global;
