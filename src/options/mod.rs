//! Configuration and policies.
//!
//! ## Contents
//! - [`Options`] shared settings + global decorator registry
//! - [`PublishStrategy`] parallel fan-out vs. sequential await
//! - [`DisposedPolicy`] ignore vs. fail when subscribing to a disposed channel
//!
//! ## Quick wiring
//! ```text
//! Arc<Options> ──► HandlerFactory (global decorators)
//!             ├──► DiagnosticsInfo (capture_stack_traces)
//!             └──► every channel (strategy, disposed policy, replay capacity)
//! ```

mod config;
mod policy;
mod registry;

pub use config::Options;
pub use policy::{DisposedPolicy, PublishStrategy};
