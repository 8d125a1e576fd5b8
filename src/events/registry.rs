use std::sync::OnceLock;
use std::time::Duration;

use super::{AuthEvent, Listener};

static REGISTRY: OnceLock<EventRegistry> = OnceLock::new();

/// How long one listener may hold up the request that fired the event.
pub const DEFAULT_LISTENER_TIMEOUT: Duration = Duration::from_millis(250);

/// Listeners registered at startup.
///
/// Events are dispatched inline, before the login or token response is
/// sent. Each listener gets at most `listener_timeout`; one that overruns is
/// abandoned for that event and the next listener runs.
pub struct EventRegistry {
    listeners: Vec<Box<dyn Listener>>,
    listener_timeout: Duration,
}

impl EventRegistry {
    fn new() -> Self {
        Self {
            listeners: Vec::new(),
            listener_timeout: DEFAULT_LISTENER_TIMEOUT,
        }
    }

    /// Listeners are called in registration order.
    pub fn listen(&mut self, listener: impl Listener) -> &mut Self {
        self.listeners.push(Box::new(listener));
        self
    }

    pub fn listener_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.listener_timeout = timeout;
        self
    }

    async fn dispatch(&self, event: &AuthEvent) {
        for (index, listener) in self.listeners.iter().enumerate() {
            if tokio::time::timeout(self.listener_timeout, listener.handle(event))
                .await
                .is_err()
            {
                log::warn!(
                    target: "portcullis::events",
                    "msg=\"listener timed out\" listener={index} event={} timeout_ms={}",
                    event.name(),
                    self.listener_timeout.as_millis()
                );
            }
        }
    }
}

/// Installs the global listener set. Only the first call takes effect.
///
/// # Example
///
/// ```rust,ignore
/// use portcullis::register_event_listeners;
/// use portcullis::events::listeners::LoggingListener;
///
/// fn main() {
///     register_event_listeners(|registry| {
///         registry
///             .listen(LoggingListener::new())
///             .listen(AuditTrail { tx });
///     });
///
///     // build the router...
/// }
/// ```
pub fn register_event_listeners<F>(f: F)
where
    F: FnOnce(&mut EventRegistry),
{
    let mut registry = EventRegistry::new();
    f(&mut registry);
    if REGISTRY.set(registry).is_err() {
        log::warn!(
            target: "portcullis",
            "register_event_listeners called more than once, ignoring"
        );
    }
}

/// Sends an event to every registered listener. No-op before registration.
pub async fn dispatch(event: AuthEvent) {
    if let Some(registry) = REGISTRY.get() {
        registry.dispatch(&event).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;

    struct Counter(Arc<AtomicUsize>);

    struct Stalled;

    #[async_trait]
    impl Listener for Stalled {
        async fn handle(&self, _event: &AuthEvent) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
    }

    #[async_trait]
    impl Listener for Counter {
        async fn handle(&self, event: &AuthEvent) {
            if let AuthEvent::LogoutSuccess { user_id, .. } = event {
                if user_id == "registry-test" {
                    self.0.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_dispatch_reaches_listener_once_registered() {
        let count = Arc::new(AtomicUsize::new(0));
        let listener = Counter(Arc::clone(&count));
        register_event_listeners(|registry| {
            registry.listen(listener);
        });

        dispatch(AuthEvent::LogoutSuccess {
            user_id: "registry-test".to_owned(),
            at: Utc::now(),
        })
        .await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stalled_listener_is_cut_off() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut registry = EventRegistry::new();
        registry
            .listener_timeout(Duration::from_millis(20))
            .listen(Stalled)
            .listen(Counter(Arc::clone(&count)));

        let started = std::time::Instant::now();
        registry
            .dispatch(&AuthEvent::LogoutSuccess {
                user_id: "registry-test".to_owned(),
                at: Utc::now(),
            })
            .await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
