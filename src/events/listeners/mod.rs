//! Ready-made listeners.
//!
//! [`LoggingListener`] writes through the `log` facade; [`TracingListener`]
//! (behind the `tracing` feature) emits structured `tracing` events.

mod logging;
#[cfg(feature = "tracing")]
mod tracing;

pub use logging::LoggingListener;
#[cfg(feature = "tracing")]
pub use self::tracing::TracingListener;
