//! run periodically to drop expired sessions, codes and access tokens

use chrono::Utc;

use crate::AuthError;
use crate::repository::{OAuthRepository, SessionRepository};

pub struct PruneExpiredSessionsAction<'a, S: ?Sized> {
    sessions: &'a S,
}

impl<'a, S> PruneExpiredSessionsAction<'a, S>
where
    S: SessionRepository + ?Sized,
{
    pub fn new(sessions: &'a S) -> Self {
        Self { sessions }
    }

    /// Returns the number of sessions removed.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self), name = "prune_expired_sessions")
    )]
    pub async fn execute(&self) -> Result<u64, AuthError> {
        let pruned = self.sessions.prune_expired_sessions(Utc::now()).await?;

        if pruned > 0 {
            log::info!(
                target: "portcullis",
                "msg=\"sessions pruned\" sessions={pruned}"
            );
        }

        Ok(pruned)
    }
}

pub struct PruneExpiredTokensAction<'a, S: ?Sized> {
    tokens: &'a S,
}

impl<'a, S> PruneExpiredTokensAction<'a, S>
where
    S: OAuthRepository + ?Sized,
{
    pub fn new(tokens: &'a S) -> Self {
        Self { tokens }
    }

    /// Drops expired authorization codes (used or not) and expired access
    /// tokens. Returns how many of each were removed.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self), name = "prune_expired_tokens")
    )]
    pub async fn execute(&self) -> Result<(u64, u64), AuthError> {
        let (grants, access_tokens) = self.tokens.prune_expired_tokens(Utc::now()).await?;

        if grants > 0 || access_tokens > 0 {
            log::info!(
                target: "portcullis::oauth",
                "msg=\"tokens pruned\" grants={grants} access_tokens={access_tokens}"
            );
        }

        Ok((grants, access_tokens))
    }
}
