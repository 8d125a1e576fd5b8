use std::convert::Infallible;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use super::error::AppError;
use super::routes::AppState;
use crate::actions::Principal;
use crate::connection::is_tls;
use crate::repository::{AuthUser, CredentialStore};
use crate::token::{TokenGenerator, bearer_token};
use crate::AuthError;

/// validates the bearer credential (session or access token) and resolves
/// its user
///
/// Behind the session bridge this covers cookie-authenticated browsers too.
/// Use `Option<AuthenticatedUser>` where anonymous requests are fine.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Principal);

impl AuthenticatedUser {
    pub fn into_inner(self) -> Principal {
        self.0
    }

    pub fn user(&self) -> &AuthUser {
        &self.0.user
    }
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()
        .and_then(bearer_token)
        .map(ToOwned::to_owned)
}

impl<S, G> FromRequestParts<AppState<S, G>> for AuthenticatedUser
where
    S: CredentialStore + 'static,
    G: TokenGenerator + 'static,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S, G>,
    ) -> Result<Self, Self::Rejection> {
        let token =
            extract_bearer_token(&parts.headers).ok_or(AppError(AuthError::Unauthenticated))?;

        let principal = state.server.authenticate(&token).await?;
        Ok(Self(principal))
    }
}

impl<S, G> OptionalFromRequestParts<AppState<S, G>> for AuthenticatedUser
where
    S: CredentialStore + 'static,
    G: TokenGenerator + 'static,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S, G>,
    ) -> Result<Option<Self>, Self::Rejection> {
        let Some(token) = extract_bearer_token(&parts.headers) else {
            return Ok(None);
        };

        match state.server.authenticate(&token).await {
            Ok(principal) => Ok(Some(Self(principal))),
            Err(e) if e.is_internal() => Err(AppError(e)),
            Err(_) => Ok(None),
        }
    }
}

/// Whether cookies set on this response should carry `Secure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Secure(pub bool);

impl<S, G> FromRequestParts<AppState<S, G>> for Secure
where
    S: CredentialStore + 'static,
    G: TokenGenerator + 'static,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S, G>,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(is_tls(
            &parts.headers,
            &parts.extensions,
            &parts.uri,
            state.server.config().trust_forwarded_proto,
        )))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer AA.abc"));
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("AA.abc"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic YzE6czNjcmV0"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer AA.abc"));
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("AA.abc"));
    }
}
