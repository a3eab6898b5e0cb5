//! # Process-wide default factory (`global` feature).
//!
//! Call [`init`] once at startup to configure the default [`EventFactory`];
//! [`factory`] returns it, building one from `Options::default()` if `init`
//! was never called.
//!
//! ```rust
//! use eventvisor::{global, Options};
//!
//! let _ = global::init(Options::default());
//! let ticks = global::factory().event::<u64>();
//! assert_eq!(ticks.handler_count(), 0);
//! ```

use std::sync::OnceLock;

use crate::channels::EventFactory;
use crate::error::ChannelError;
use crate::options::Options;

static FACTORY: OnceLock<EventFactory> = OnceLock::new();

/// Installs the default factory built from `options`.
///
/// # Errors
/// [`ChannelError::AlreadyInitialized`] if a factory is already installed,
/// including the fallback one created by an earlier [`factory`] call.
pub fn init(options: Options) -> Result<(), ChannelError> {
    FACTORY
        .set(EventFactory::with_options(options))
        .map_err(|_| ChannelError::AlreadyInitialized)?;
    tracing::debug!("global factory initialized");
    Ok(())
}

/// The default factory.
pub fn factory() -> &'static EventFactory {
    FACTORY.get_or_init(EventFactory::default)
}
