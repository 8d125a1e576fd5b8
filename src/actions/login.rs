use chrono::{Duration, Utc};

use super::credentials::{CredentialCheck, check_credentials};
use crate::crypto::{PasswordHasher, hash_token};
use crate::events::{AuthEvent, dispatch};
use crate::repository::{AuthUser, Session, SessionRepository, UserRepository};
use crate::session::SessionCookie;
use crate::token::TokenGenerator;
use crate::{AuthError, SecretString};

/// A successful login: the new session and the cookie payload for it.
#[derive(Debug)]
pub struct LoginOutcome {
    pub user: AuthUser,
    pub session: Session,
    pub cookie: SessionCookie,
}

pub struct LoginAction<'a, S: ?Sized, G: ?Sized> {
    store: &'a S,
    generator: &'a G,
    hasher: &'a dyn PasswordHasher,
    session_lifetime: Duration,
}

impl<'a, S, G> LoginAction<'a, S, G>
where
    S: UserRepository + SessionRepository + ?Sized,
    G: TokenGenerator + ?Sized,
{
    pub fn new(
        store: &'a S,
        generator: &'a G,
        hasher: &'a dyn PasswordHasher,
        session_lifetime: Duration,
    ) -> Self {
        Self {
            store,
            generator,
            hasher,
            session_lifetime,
        }
    }

    /// Verifies the credentials and opens a new session.
    ///
    /// Unknown user and wrong password both return
    /// `AuthError::InvalidCredentials`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "login", skip_all, err)
    )]
    pub async fn execute(
        &self,
        user_id: &str,
        password: &SecretString,
    ) -> Result<LoginOutcome, AuthError> {
        let check =
            check_credentials(self.store, self.hasher, user_id, password.expose_secret()).await?;

        let user = match check {
            CredentialCheck::Valid(user) => user,
            failed => {
                let reason = failed.failure_reason().unwrap_or("invalid credentials");
                log::warn!(
                    target: "portcullis",
                    "msg=\"login failed\" user_id=\"{user_id}\" reason=\"{reason}\""
                );
                dispatch(AuthEvent::LoginFailed {
                    user_id: user_id.to_owned(),
                    reason: reason.to_owned(),
                    at: Utc::now(),
                })
                .await;
                return Err(AuthError::InvalidCredentials);
            }
        };

        let (session_id, secret) = self.generator.session_credentials();
        let now = Utc::now();
        let session = Session {
            id: session_id,
            secret_hash: hash_token(secret.expose_secret()),
            user_id: user.id.clone(),
            created_at: now,
            expires_at: now + self.session_lifetime,
        };
        self.store.create_session(session.clone()).await?;

        log::info!(
            target: "portcullis",
            "msg=\"login success\" user_id=\"{}\"",
            user.id
        );
        dispatch(AuthEvent::LoginSuccess {
            user_id: user.id.clone(),
            at: now,
        })
        .await;

        let cookie = SessionCookie {
            session_id: session.id.clone(),
            session_secret: secret.expose_secret().to_owned(),
        };
        Ok(LoginOutcome {
            user,
            session,
            cookie,
        })
    }
}
