use chrono::Utc;

use crate::AuthError;
use crate::crypto::verify_token_hash;
use crate::events::{AuthEvent, dispatch};
use crate::repository::SessionRepository;
use crate::token::BearerCredential;

/// Ends the browser session named by a session bearer.
///
/// Logging out is idempotent: a missing, unknown or already deleted session
/// is not an error. Access tokens are not sessions and are left alone.
pub struct LogoutAction<'a, S: ?Sized> {
    sessions: &'a S,
}

impl<'a, S> LogoutAction<'a, S>
where
    S: SessionRepository + ?Sized,
{
    pub fn new(sessions: &'a S) -> Self {
        Self { sessions }
    }

    /// Returns the ID of the user whose session was deleted, if any.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "logout", skip_all, err)
    )]
    pub async fn execute(&self, bearer: Option<&str>) -> Result<Option<String>, AuthError> {
        let Some(BearerCredential::Session { id, secret }) = bearer.and_then(BearerCredential::parse)
        else {
            return Ok(None);
        };

        let Some(session) = self.sessions.find_session(&id).await? else {
            return Ok(None);
        };

        // someone holding only the session ID must not be able to end it
        if !verify_token_hash(secret.expose_secret(), &session.secret_hash) {
            return Ok(None);
        }

        self.sessions.delete_session(&id).await?;

        log::info!(
            target: "portcullis",
            "msg=\"logout success\" user_id=\"{}\"",
            session.user_id
        );
        dispatch(AuthEvent::LogoutSuccess {
            user_id: session.user_id.clone(),
            at: Utc::now(),
        })
        .await;

        Ok(Some(session.user_id))
    }
}
