//! In-memory credential store.
//!
//! Suitable for development, tests and single-instance demos. Everything is
//! lost on restart.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::client::{ClientRepository, OAuthClient};
use super::oauth::{AccessToken, AuthorizationGrant, OAuthRepository, RefreshToken};
use super::session::{Session, SessionRepository};
use super::user::{AuthUser, UserRepository};
use crate::AuthError;

#[derive(Default)]
struct Inner {
    users: HashMap<String, AuthUser>,
    sessions: HashMap<String, Session>,
    clients: HashMap<String, OAuthClient>,
    grants: HashMap<String, AuthorizationGrant>,
    access_tokens: HashMap<String, AccessToken>,
    refresh_tokens: HashMap<String, RefreshToken>,
}

/// Stores everything in `HashMap`s behind one `RwLock`.
///
/// Every check-and-set runs under a single write guard, which gives the
/// conditional-update semantics [`OAuthRepository`] requires.
#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, AuthError> {
        self.inner
            .read()
            .map_err(|_| AuthError::DatabaseError("Lock poisoned".to_owned()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, AuthError> {
        self.inner
            .write()
            .map_err(|_| AuthError::DatabaseError("Lock poisoned".to_owned()))
    }

    /// Inserts or replaces a user.
    pub fn insert_user(&self, user: AuthUser) -> Result<(), AuthError> {
        self.write()?.users.insert(user.id.clone(), user);
        Ok(())
    }

    /// Inserts or replaces a client.
    pub fn insert_client(&self, client: OAuthClient) -> Result<(), AuthError> {
        self.write()?.clients.insert(client.id.clone(), client);
        Ok(())
    }

    pub fn session_count(&self) -> usize {
        self.read().map(|inner| inner.sessions.len()).unwrap_or(0)
    }

    pub fn authorization_count(&self) -> usize {
        self.read().map(|inner| inner.grants.len()).unwrap_or(0)
    }

    pub fn access_token_count(&self) -> usize {
        self.read().map(|inner| inner.access_tokens.len()).unwrap_or(0)
    }

    pub fn refresh_token_count(&self) -> usize {
        self.read().map(|inner| inner.refresh_tokens.len()).unwrap_or(0)
    }
}

#[async_trait]
impl UserRepository for InMemoryCredentialStore {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<AuthUser>, AuthError> {
        Ok(self.read()?.users.get(id).cloned())
    }
}

#[async_trait]
impl SessionRepository for InMemoryCredentialStore {
    async fn create_session(&self, session: Session) -> Result<(), AuthError> {
        self.write()?.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn find_session(&self, id: &str) -> Result<Option<Session>, AuthError> {
        Ok(self.read()?.sessions.get(id).cloned())
    }

    async fn delete_session(&self, id: &str) -> Result<(), AuthError> {
        self.write()?.sessions.remove(id);
        Ok(())
    }

    #[allow(clippy::significant_drop_tightening)]
    async fn prune_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut inner = self.write()?;
        let before = inner.sessions.len();
        inner.sessions.retain(|_, session| !session.is_expired(now));
        Ok(count(before.saturating_sub(inner.sessions.len())))
    }
}

#[async_trait]
impl ClientRepository for InMemoryCredentialStore {
    async fn find_client(&self, id: &str) -> Result<Option<OAuthClient>, AuthError> {
        Ok(self.read()?.clients.get(id).cloned())
    }
}

#[async_trait]
impl OAuthRepository for InMemoryCredentialStore {
    async fn create_authorization(&self, grant: AuthorizationGrant) -> Result<(), AuthError> {
        self.write()?.grants.insert(grant.code_hash.clone(), grant);
        Ok(())
    }

    async fn consume_authorization(
        &self,
        code_hash: &str,
    ) -> Result<Option<AuthorizationGrant>, AuthError> {
        let mut inner = self.write()?;
        match inner.grants.get_mut(code_hash) {
            Some(grant) if !grant.used => {
                grant.used = true;
                Ok(Some(grant.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn create_access_token(&self, token: AccessToken) -> Result<(), AuthError> {
        self.write()?
            .access_tokens
            .insert(token.token_hash.clone(), token);
        Ok(())
    }

    async fn find_access_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<AccessToken>, AuthError> {
        Ok(self.read()?.access_tokens.get(token_hash).cloned())
    }

    async fn delete_access_tokens_for_refresh(
        &self,
        refresh_token_hash: &str,
    ) -> Result<u64, AuthError> {
        let mut inner = self.write()?;
        let before = inner.access_tokens.len();
        inner
            .access_tokens
            .retain(|_, t| t.refresh_token_hash.as_deref() != Some(refresh_token_hash));
        Ok(count(before.saturating_sub(inner.access_tokens.len())))
    }

    async fn create_refresh_token(&self, token: RefreshToken) -> Result<(), AuthError> {
        self.write()?
            .refresh_tokens
            .insert(token.token_hash.clone(), token);
        Ok(())
    }

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, AuthError> {
        Ok(self.read()?.refresh_tokens.get(token_hash).cloned())
    }

    async fn consume_refresh_token(
        &self,
        token_hash: &str,
        client_id: &str,
    ) -> Result<Option<RefreshToken>, AuthError> {
        let mut inner = self.write()?;
        let owned_by_client = inner
            .refresh_tokens
            .get(token_hash)
            .is_some_and(|t| t.client_id == client_id);
        if !owned_by_client {
            return Ok(None);
        }
        Ok(inner.refresh_tokens.remove(token_hash))
    }

    #[allow(clippy::significant_drop_tightening)]
    async fn prune_expired_tokens(&self, now: DateTime<Utc>) -> Result<(u64, u64), AuthError> {
        let mut inner = self.write()?;
        let grants = inner.grants.len();
        let access_tokens = inner.access_tokens.len();
        inner.grants.retain(|_, grant| !grant.is_expired(now));
        inner.access_tokens.retain(|_, token| !token.is_expired(now));
        Ok((
            count(grants.saturating_sub(inner.grants.len())),
            count(access_tokens.saturating_sub(inner.access_tokens.len())),
        ))
    }
}

fn count(removed: usize) -> u64 {
    u64::try_from(removed).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn grant(code_hash: &str) -> AuthorizationGrant {
        let now = Utc::now();
        AuthorizationGrant {
            code_hash: code_hash.to_owned(),
            client_id: "c1".to_owned(),
            user_id: "alice".to_owned(),
            redirect_uri: "https://app/cb".to_owned(),
            scope: "profile".to_owned(),
            issued_at: now,
            expires_at: now + Duration::minutes(5),
            used: false,
        }
    }

    fn refresh(token_hash: &str, client_id: &str) -> RefreshToken {
        RefreshToken {
            token_hash: token_hash.to_owned(),
            client_id: client_id.to_owned(),
            user_id: "alice".to_owned(),
            scope: String::new(),
            issued_at: Utc::now(),
        }
    }

    fn access_token(token_hash: &str, expires_at: DateTime<Utc>) -> AccessToken {
        AccessToken {
            token_hash: token_hash.to_owned(),
            client_id: "c1".to_owned(),
            user_id: "alice".to_owned(),
            scope: String::new(),
            issued_at: expires_at - Duration::hours(1),
            expires_at,
            refresh_token_hash: None,
        }
    }

    #[tokio::test]
    async fn test_prune_expired_tokens() {
        let store = InMemoryCredentialStore::new();
        let now = Utc::now();
        let month_ago = now - Duration::days(30);

        for i in 0..100 {
            let mut stale = grant(&format!("old{i}"));
            stale.expires_at = month_ago;
            stale.used = i % 2 == 0;
            store.create_authorization(stale).await.unwrap();
            store
                .create_access_token(access_token(&format!("old{i}"), month_ago))
                .await
                .unwrap();
        }
        store.create_authorization(grant("live")).await.unwrap();
        store
            .create_access_token(access_token("live", now + Duration::hours(1)))
            .await
            .unwrap();
        store.create_refresh_token(refresh("rt", "c1")).await.unwrap();

        assert_eq!(store.prune_expired_tokens(now).await.unwrap(), (100, 100));
        assert_eq!(store.authorization_count(), 1);
        assert_eq!(store.access_token_count(), 1);
        assert_eq!(store.refresh_token_count(), 1);
        assert!(store.consume_authorization("live").await.unwrap().is_some());

        assert_eq!(store.prune_expired_tokens(now).await.unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn test_consume_authorization_once() {
        let store = InMemoryCredentialStore::new();
        store.create_authorization(grant("h1")).await.unwrap();

        let first = store.consume_authorization("h1").await.unwrap();
        assert!(first.is_some_and(|g| g.used));

        let second = store.consume_authorization("h1").await.unwrap();
        assert!(second.is_none());

        assert!(store.consume_authorization("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_consume_has_single_winner() {
        let store = InMemoryCredentialStore::new();
        store.create_authorization(grant("race")).await.unwrap();

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.consume_authorization("race").await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_consume_refresh_token_checks_client() {
        let store = InMemoryCredentialStore::new();
        store.create_refresh_token(refresh("rt", "c1")).await.unwrap();

        assert!(store.consume_refresh_token("rt", "c2").await.unwrap().is_none());
        assert_eq!(store.refresh_token_count(), 1);

        assert!(store.consume_refresh_token("rt", "c1").await.unwrap().is_some());
        assert!(store.consume_refresh_token("rt", "c1").await.unwrap().is_none());
        assert_eq!(store.refresh_token_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_access_tokens_for_refresh() {
        let store = InMemoryCredentialStore::new();
        let now = Utc::now();
        for (hash, refresh_hash) in [("a1", Some("r1")), ("a2", Some("r2")), ("a3", None)] {
            store
                .create_access_token(AccessToken {
                    token_hash: hash.to_owned(),
                    client_id: "c1".to_owned(),
                    user_id: "alice".to_owned(),
                    scope: String::new(),
                    issued_at: now,
                    expires_at: now + Duration::hours(1),
                    refresh_token_hash: refresh_hash.map(str::to_owned),
                })
                .await
                .unwrap();
        }

        let removed = store.delete_access_tokens_for_refresh("r1").await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.find_access_token("a1").await.unwrap().is_none());
        assert!(store.find_access_token("a2").await.unwrap().is_some());
        assert_eq!(store.access_token_count(), 2);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let store = InMemoryCredentialStore::new();
        let now = Utc::now();
        for (id, expires_at) in [("live", now + Duration::hours(1)), ("dead", now - Duration::hours(1))] {
            store
                .create_session(Session {
                    id: id.to_owned(),
                    secret_hash: "h".to_owned(),
                    user_id: "alice".to_owned(),
                    created_at: now - Duration::hours(2),
                    expires_at,
                })
                .await
                .unwrap();
        }

        assert!(store.find_session("live").await.unwrap().is_some());
        assert_eq!(store.prune_expired_sessions(now).await.unwrap(), 1);
        assert_eq!(store.session_count(), 1);

        store.delete_session("live").await.unwrap();
        store.delete_session("live").await.unwrap();
        assert_eq!(store.session_count(), 0);
    }
}
