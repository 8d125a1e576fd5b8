use async_trait::async_trait;

use super::AuthEvent;

/// Handles gateway events asynchronously.
///
/// Listeners run inline with the request that fired the event; keep them
/// quick or hand work off to a task.
///
/// # Example
///
/// ```rust,ignore
/// use portcullis::events::{AuthEvent, Listener};
/// use async_trait::async_trait;
/// use tokio::sync::mpsc;
///
/// struct AuditTrail {
///     tx: mpsc::UnboundedSender<String>,
/// }
///
/// #[async_trait]
/// impl Listener for AuditTrail {
///     async fn handle(&self, event: &AuthEvent) {
///         if let AuthEvent::AuthorizationGranted { client_id, user_id, .. } = event {
///             let _ = self.tx.send(format!("{user_id} authorized {client_id}"));
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Called for every dispatched event. Match on the variant to filter.
    async fn handle(&self, event: &AuthEvent);
}
