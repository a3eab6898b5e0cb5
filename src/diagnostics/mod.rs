//! Subscription diagnostics for inspection tools.
//!
//! - [`DiagnosticsInfo`] counters, dirty flag, captured call sites
//! - [`StackTraceInfo`] one captured `subscribe` call
//! - [`RegistryId`] / [`SubscriptionId`] process-wide identities

mod ids;
mod info;

pub use ids::{RegistryId, SubscriptionId};
pub use info::{DiagnosticsInfo, StackTraceInfo};
