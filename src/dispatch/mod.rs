//! # Handler invocation and completion.
//!
//! Internal machinery shared by every channel:
//! - `Invocation`: one started handler call (done inline, or a future)
//! - `WhenAll`: parallel completion aggregator with pooled awaiter nodes
//! - `run`: picks sequential await or the aggregator
//! - `fire_and_forget` / `detach`: futures the caller will not await
//!
//! ```text
//! publish_async ──► snapshot ──► run(count, strategy)
//!                                  ├─ Sequential ─► invoke(i).resolve().await, i = 0..n
//!                                  └─ Parallel   ─► WhenAll::start(n) .await
//! publish       ──► snapshot ──► Done → propagate error
//!                                Started → fire_and_forget
//! ```

mod aggregate;
mod invocation;
mod run;

pub(crate) use aggregate::Gather;
pub(crate) use invocation::{fire_and_forget, Invocation};
pub(crate) use run::run;
