//! # Handlers, decorators and chain composition.
//!
//! This module provides the subscriber-side building blocks:
//! - [`Handler`] / [`RequestHandler`] - tagged unions over the three call shapes
//! - [`Decorator`] / [`RequestDecorator`] - ordered middleware around one invocation
//! - [`Filter`] - built-in predicate decorator (runs first)
//! - [`HandlerFactory`] - composes terminal handler + decorators into one chain
//!
//! ## Architecture
//! ```text
//! subscribe(handler, decorators)
//!     └─► HandlerFactory::build
//!           ├─ Options::decorators::<T>()      (global, per message type)
//!           ├─ call-site decorators
//!           └─ one chain for handler.shape():
//!                Sync            next(&msg)
//!                Async           next(msg).await
//!                AsyncCancelable next(msg, token).await
//! ```

mod decorator;
mod factory;
mod filter;
mod handler;
mod request;

pub use decorator::{Decorator, DecoratorRef, RequestDecorator, RequestDecoratorRef};
pub use factory::HandlerFactory;
pub use filter::Filter;
pub use handler::{AsyncFn, CancelableFn, Handler, Shape, SyncFn};
pub use request::{AsyncRequestFn, CancelableRequestFn, RequestHandler, SyncRequestFn};
