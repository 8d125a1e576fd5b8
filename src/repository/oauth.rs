use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AuthError;

/// An issued authorization code. Only its hash is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationGrant {
    pub code_hash: String,
    pub client_id: String,
    pub user_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl AuthorizationGrant {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub token_hash: String,
    pub client_id: String,
    pub user_id: String,
    pub scope: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Hash of the refresh token issued alongside this access token.
    pub refresh_token_hash: Option<String>,
}

impl AccessToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Refresh tokens do not expire; they live until exchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub token_hash: String,
    pub client_id: String,
    pub user_id: String,
    pub scope: String,
    pub issued_at: DateTime<Utc>,
}

#[async_trait]
pub trait OAuthRepository: Send + Sync {
    async fn create_authorization(&self, grant: AuthorizationGrant) -> Result<(), AuthError>;

    /// Atomically flips `used` from false to true.
    ///
    /// Returns the grant (with `used == true`) only to the caller that
    /// performed the transition. Unknown or already used codes yield `None`.
    async fn consume_authorization(
        &self,
        code_hash: &str,
    ) -> Result<Option<AuthorizationGrant>, AuthError>;

    async fn create_access_token(&self, token: AccessToken) -> Result<(), AuthError>;

    async fn find_access_token(&self, token_hash: &str)
    -> Result<Option<AccessToken>, AuthError>;

    /// Deletes every access token issued together with the given refresh token.
    async fn delete_access_tokens_for_refresh(
        &self,
        refresh_token_hash: &str,
    ) -> Result<u64, AuthError>;

    async fn create_refresh_token(&self, token: RefreshToken) -> Result<(), AuthError>;

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, AuthError>;

    /// Atomically removes the refresh token if it exists and belongs to
    /// `client_id`.
    ///
    /// Only one concurrent caller may receive `Some`. A token owned by
    /// another client is left untouched.
    async fn consume_refresh_token(
        &self,
        token_hash: &str,
        client_id: &str,
    ) -> Result<Option<RefreshToken>, AuthError>;

    /// Removes authorization grants and access tokens that expired before
    /// `now`, used or not. Refresh tokens are untouched.
    ///
    /// Returns `(grants, access_tokens)` removed.
    async fn prune_expired_tokens(&self, now: DateTime<Utc>) -> Result<(u64, u64), AuthError>;
}
