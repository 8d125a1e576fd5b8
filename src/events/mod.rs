//! Login and OAuth activity, fanned out to registered listeners.
//!
//! Actions and the authorization server fire an [`AuthEvent`] at each
//! outcome worth auditing. Dispatch is a no-op until something is
//! registered. Listeners run inline, after the store writes but before the
//! response goes out, so a slow listener delays the response by up to its
//! timeout ([`DEFAULT_LISTENER_TIMEOUT`] unless changed with
//! [`EventRegistry::listener_timeout`]). It never changes the outcome.
//!
//! ```rust,ignore
//! use portcullis::register_event_listeners;
//! use portcullis::events::listeners::LoggingListener;
//!
//! register_event_listeners(|registry| {
//!     registry.listen(LoggingListener::new().failures_at(log::Level::Error));
//! });
//! ```
//!
//! A listener only needs [`Listener::handle`]. Counting refresh-token
//! rotations per client, for example:
//!
//! ```rust,ignore
//! struct RotationCounter(DashMap<String, u64>);
//!
//! #[async_trait]
//! impl Listener for RotationCounter {
//!     async fn handle(&self, event: &AuthEvent) {
//!         if let AuthEvent::TokenRefreshed { client_id, .. } = event {
//!             *self.0.entry(client_id.clone()).or_default() += 1;
//!         }
//!     }
//! }
//! ```

mod event;
mod listener;
mod registry;

pub mod listeners;

pub use event::AuthEvent;
pub use listener::Listener;
pub use registry::{
    DEFAULT_LISTENER_TIMEOUT, EventRegistry, dispatch, register_event_listeners,
};
