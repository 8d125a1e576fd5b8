use async_trait::async_trait;

use crate::events::{AuthEvent, Listener};

/// Emits each event as a structured `tracing` event, so it lands inside
/// whatever request span is current. Failures are emitted at `WARN`.
pub struct TracingListener;

#[async_trait]
impl Listener for TracingListener {
    async fn handle(&self, event: &AuthEvent) {
        let (detail_key, detail) = event.detail().unwrap_or(("detail", ""));
        if event.is_failure() {
            tracing::warn!(
                target: "portcullis::events",
                event = event.name(),
                user_id = event.user_id(),
                client_id = event.client_id(),
                detail_key,
                detail,
            );
        } else {
            tracing::info!(
                target: "portcullis::events",
                event = event.name(),
                user_id = event.user_id(),
                client_id = event.client_id(),
                detail_key,
                detail,
            );
        }
    }
}
