use chrono::Utc;

use crate::AuthError;
use crate::crypto::{hash_token, verify_token_hash};
use crate::repository::{AuthUser, OAuthRepository, SessionRepository, UserRepository};
use crate::token::BearerCredential;

/// How a request authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Session { session_id: String },
    AccessToken { client_id: String, scope: String },
}

/// An authenticated caller.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: AuthUser,
    pub credential: Credential,
}

impl Principal {
    pub fn session_id(&self) -> Option<&str> {
        match &self.credential {
            Credential::Session { session_id } => Some(session_id),
            Credential::AccessToken { .. } => None,
        }
    }
}

/// Resolves a bearer value (`SESSION.<id>.<secret>` or `AA.<token>`) to a
/// [`Principal`].
pub struct AuthenticateAction<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> AuthenticateAction<'a, S>
where
    S: UserRepository + SessionRepository + OAuthRepository + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "authenticate", skip_all, err)
    )]
    pub async fn execute(&self, bearer: &str) -> Result<Principal, AuthError> {
        let credential = BearerCredential::parse(bearer).ok_or(AuthError::TokenInvalid)?;
        let now = Utc::now();

        let (user_id, credential) = match credential {
            BearerCredential::Session { id, secret } => {
                let session = self
                    .store
                    .find_session(&id)
                    .await?
                    .ok_or(AuthError::TokenInvalid)?;

                if !verify_token_hash(secret.expose_secret(), &session.secret_hash) {
                    log::warn!(
                        target: "portcullis::session",
                        "msg=\"session secret mismatch\" session_id=\"{id}\""
                    );
                    return Err(AuthError::TokenInvalid);
                }

                if session.is_expired(now) {
                    self.store.delete_session(&id).await?;
                    return Err(AuthError::SessionExpired);
                }

                (session.user_id, Credential::Session { session_id: id })
            }
            BearerCredential::AccessToken(token) => {
                let token = self
                    .store
                    .find_access_token(&hash_token(token.expose_secret()))
                    .await?
                    .ok_or(AuthError::TokenInvalid)?;

                if token.is_expired(now) {
                    return Err(AuthError::TokenExpired);
                }

                (
                    token.user_id,
                    Credential::AccessToken {
                        client_id: token.client_id,
                        scope: token.scope,
                    },
                )
            }
        };

        let user = self
            .store
            .find_user_by_id(&user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(Principal { user, credential })
    }
}
