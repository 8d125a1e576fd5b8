use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AuthError;

/// A browser login.
///
/// Only a hash of the secret is kept; the plaintext lives in the encrypted
/// session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub secret_hash: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(&self, session: Session) -> Result<(), AuthError>;

    async fn find_session(&self, id: &str) -> Result<Option<Session>, AuthError>;

    /// Deleting a missing session is not an error.
    async fn delete_session(&self, id: &str) -> Result<(), AuthError>;

    /// Removes expired sessions and returns how many were removed.
    async fn prune_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        let session = Session {
            id: "sid".to_owned(),
            secret_hash: "hash".to_owned(),
            user_id: "alice".to_owned(),
            created_at: now - Duration::hours(2),
            expires_at: now - Duration::seconds(1),
        };
        assert!(session.is_expired(now));
        assert!(!session.is_expired(now - Duration::minutes(1)));
    }
}
