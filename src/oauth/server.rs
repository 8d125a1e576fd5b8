use std::sync::Arc;

use chrono::Utc;
use url::Url;

use super::error::{ErrorCode, OAuthError};
use super::request::{
    AuthorizeRequest, ClientCredentials, TokenRequest, TokenResponse, is_scope_subset,
    normalize_scope,
};
use crate::actions::{
    AuthenticateAction, CredentialCheck, LoginAction, LoginOutcome, LogoutAction, Principal,
    PruneExpiredSessionsAction, PruneExpiredTokensAction, check_credentials,
};
use crate::config::GatewayConfig;
use crate::crypto::{Argon2Hasher, PasswordHasher, hash_token, verify_token_hash};
use crate::events::{AuthEvent, dispatch};
use crate::repository::{
    AccessToken, AuthUser, AuthorizationGrant, CredentialStore, GrantType, OAuthClient,
    RefreshToken,
};
use crate::token::{RandomTokenGenerator, TokenGenerator};
use crate::{AuthError, SecretString};

pub const TOKEN_TYPE: &str = "bearer";

const RESPONSE_TYPE_CODE: &str = "code";

/// An authorization request whose client and redirect URI checked out.
#[derive(Debug, Clone)]
pub struct ValidatedAuthorization {
    pub client: OAuthClient,
    pub redirect_uri: String,
    pub scope: String,
    pub state: Option<String>,
}

/// Why an authorization request was refused.
#[derive(Debug)]
pub enum AuthorizeRejection {
    /// The client or redirect URI cannot be trusted, so the error goes
    /// straight back to the user agent.
    Direct(OAuthError),
    /// The redirect URI is registered; the error is reported to the client.
    Redirect {
        redirect_uri: String,
        error: ErrorCode,
        description: String,
        state: Option<String>,
    },
}

impl AuthorizeRejection {
    /// The `Location` for a [`AuthorizeRejection::Redirect`].
    pub fn location(&self) -> Option<String> {
        match self {
            Self::Direct(_) => None,
            Self::Redirect {
                redirect_uri,
                error,
                description,
                state,
            } => {
                let mut params = vec![
                    ("error", error.as_str()),
                    ("error_description", description.as_str()),
                ];
                if let Some(state) = state {
                    params.push(("state", state.as_str()));
                }
                Some(redirect_with(redirect_uri, &params))
            }
        }
    }
}

/// Appends query parameters to a registered redirect URI.
fn redirect_with(uri: &str, params: &[(&str, &str)]) -> String {
    match Url::parse(uri) {
        Ok(mut url) => {
            url.query_pairs_mut().extend_pairs(params);
            url.to_string()
        }
        Err(_) => {
            let separator = if uri.contains('?') { '&' } else { '?' };
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params)
                .finish();
            format!("{uri}{separator}{query}")
        }
    }
}

/// The OAuth2 authorization server and browser login.
///
/// Owns no mutable state of its own; everything that must survive a request
/// goes through the store, and the single-use guarantees for codes and
/// refresh tokens come from the store's conditional updates.
///
/// ```rust,ignore
/// let server = AuthorizationServer::new(
///     Arc::new(InMemoryCredentialStore::new()),
///     RandomTokenGenerator::default(),
///     GatewayConfig::default(),
/// );
/// let outcome = server.login("alice", &SecretString::new("wonderland")).await?;
/// ```
pub struct AuthorizationServer<S, G = RandomTokenGenerator> {
    store: Arc<S>,
    generator: G,
    hasher: Arc<dyn PasswordHasher>,
    config: GatewayConfig,
}

impl<S, G> AuthorizationServer<S, G>
where
    S: CredentialStore + 'static,
    G: TokenGenerator + 'static,
{
    pub fn new(store: Arc<S>, generator: G, config: GatewayConfig) -> Self {
        Self {
            store,
            generator,
            hasher: Arc::new(Argon2Hasher::default()),
            config,
        }
    }

    #[must_use]
    pub fn with_password_hasher(mut self, hasher: impl PasswordHasher + 'static) -> Self {
        self.hasher = Arc::new(hasher);
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn login(
        &self,
        user_id: &str,
        password: &SecretString,
    ) -> Result<LoginOutcome, AuthError> {
        LoginAction::new(
            self.store.as_ref(),
            &self.generator,
            self.hasher.as_ref(),
            self.config.session.session_lifetime,
        )
        .execute(user_id, password)
        .await
    }

    /// Deletes the session behind `bearer`, if any. Never fails for a
    /// missing or stale session.
    pub async fn logout(&self, bearer: Option<&str>) -> Result<(), AuthError> {
        LogoutAction::new(self.store.as_ref())
            .execute(bearer)
            .await
            .map(|_| ())
    }

    pub async fn authenticate(&self, bearer: &str) -> Result<Principal, AuthError> {
        AuthenticateAction::new(self.store.as_ref())
            .execute(bearer)
            .await
    }

    pub async fn current_user(&self, bearer: Option<&str>) -> Result<AuthUser, AuthError> {
        let bearer = bearer.ok_or(AuthError::Unauthenticated)?;
        Ok(self.authenticate(bearer).await?.user)
    }

    pub async fn prune_expired_sessions(&self) -> Result<u64, AuthError> {
        PruneExpiredSessionsAction::new(self.store.as_ref())
            .execute()
            .await
    }

    /// Returns `(grants, access_tokens)` removed.
    pub async fn prune_expired_tokens(&self) -> Result<(u64, u64), AuthError> {
        PruneExpiredTokensAction::new(self.store.as_ref())
            .execute()
            .await
    }

    /// Checks client, redirect URI and response type. Nothing is written.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "oauth.validate_authorize", skip_all)
    )]
    pub async fn validate_authorize(
        &self,
        request: &AuthorizeRequest,
    ) -> Result<ValidatedAuthorization, AuthorizeRejection> {
        let separator = self.config.oauth.redirect_uri_separator.as_str();

        let client_id = request
            .client_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AuthorizeRejection::Direct(OAuthError::invalid_request("client_id is required"))
            })?;

        let client = match self.store.find_client(client_id).await {
            Ok(Some(client)) => client,
            Ok(None) => {
                return Err(AuthorizeRejection::Direct(OAuthError::new(
                    ErrorCode::InvalidClient,
                    "unknown client",
                )));
            }
            Err(e) => return Err(AuthorizeRejection::Direct(self.store_failure(e))),
        };

        let redirect_uri = match request.redirect_uri.as_deref().filter(|u| !u.is_empty()) {
            Some(uri) if client.has_redirect_uri(uri, separator) => uri.to_owned(),
            Some(uri) => {
                log::warn!(
                    target: "portcullis::oauth",
                    "msg=\"unregistered redirect uri\" client_id=\"{}\" redirect_uri=\"{uri}\"",
                    client.id
                );
                return Err(AuthorizeRejection::Direct(OAuthError::invalid_request(
                    "redirect_uri is not registered for this client",
                )));
            }
            None => client
                .sole_redirect_uri(separator)
                .map(ToOwned::to_owned)
                .ok_or_else(|| {
                    AuthorizeRejection::Direct(OAuthError::invalid_request(
                        "redirect_uri is required",
                    ))
                })?,
        };

        let redirect_error = |error: ErrorCode, description: &str| AuthorizeRejection::Redirect {
            redirect_uri: redirect_uri.clone(),
            error,
            description: description.to_owned(),
            state: request.state.clone(),
        };

        match request.response_type.as_deref() {
            Some(RESPONSE_TYPE_CODE) => {}
            None | Some("") => {
                return Err(redirect_error(
                    ErrorCode::InvalidRequest,
                    "response_type is required",
                ));
            }
            Some(_) => {
                return Err(redirect_error(
                    ErrorCode::UnsupportedResponseType,
                    "only the code response type is supported",
                ));
            }
        }

        if !client.allows_grant(GrantType::AuthorizationCode) {
            return Err(redirect_error(
                ErrorCode::UnauthorizedClient,
                "client may not use the authorization code grant",
            ));
        }

        Ok(ValidatedAuthorization {
            client,
            redirect_uri,
            scope: normalize_scope(request.scope.as_deref().unwrap_or_default()),
            state: request.state.clone(),
        })
    }

    /// Records the grant and returns the redirect carrying the code.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "oauth.approve", skip_all, err)
    )]
    pub async fn approve(
        &self,
        authorization: &ValidatedAuthorization,
        user_id: &str,
    ) -> Result<String, OAuthError> {
        let code = self.generator.authorization_code();
        let now = Utc::now();

        self.store
            .create_authorization(AuthorizationGrant {
                code_hash: hash_token(code.expose_secret()),
                client_id: authorization.client.id.clone(),
                user_id: user_id.to_owned(),
                redirect_uri: authorization.redirect_uri.clone(),
                scope: authorization.scope.clone(),
                issued_at: now,
                expires_at: now + self.config.oauth.authorization_code_lifetime,
                used: false,
            })
            .await
            .map_err(|e| self.store_failure(e))?;

        log::info!(
            target: "portcullis::oauth",
            "msg=\"authorization granted\" client_id=\"{}\" user_id=\"{user_id}\"",
            authorization.client.id
        );
        dispatch(AuthEvent::AuthorizationGranted {
            client_id: authorization.client.id.clone(),
            user_id: user_id.to_owned(),
            scope: authorization.scope.clone(),
            at: now,
        })
        .await;

        let mut params = vec![("code", code.expose_secret())];
        if let Some(state) = &authorization.state {
            params.push(("state", state.as_str()));
        }
        Ok(redirect_with(&authorization.redirect_uri, &params))
    }

    /// Returns the redirect reporting `access_denied`.
    pub async fn deny(&self, authorization: &ValidatedAuthorization, user_id: &str) -> String {
        log::info!(
            target: "portcullis::oauth",
            "msg=\"authorization denied\" client_id=\"{}\" user_id=\"{user_id}\"",
            authorization.client.id
        );
        dispatch(AuthEvent::AuthorizationDenied {
            client_id: authorization.client.id.clone(),
            user_id: user_id.to_owned(),
            at: Utc::now(),
        })
        .await;

        let mut params = vec![
            ("error", ErrorCode::AccessDenied.as_str()),
            ("error_description", "the resource owner denied the request"),
        ];
        if let Some(state) = &authorization.state {
            params.push(("state", state.as_str()));
        }
        redirect_with(&authorization.redirect_uri, &params)
    }

    /// The token endpoint.
    ///
    /// `basic` holds credentials from an `Authorization: Basic` header; they
    /// take precedence over `client_id`/`client_secret` in the body.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "oauth.token", skip_all, err)
    )]
    pub async fn token(
        &self,
        request: TokenRequest,
        basic: Option<ClientCredentials>,
    ) -> Result<TokenResponse, OAuthError> {
        let result = self.exchange(request, basic).await;
        match &result {
            Err(OAuthError::Protocol { code, description }) => log::info!(
                target: "portcullis::oauth",
                "msg=\"token request rejected\" error={code} description=\"{description}\""
            ),
            Err(OAuthError::Store(e)) => log::error!(
                target: "portcullis::oauth",
                "msg=\"token request failed\" error=\"{e}\""
            ),
            Ok(_) => {}
        }
        result
    }

    async fn exchange(
        &self,
        request: TokenRequest,
        basic: Option<ClientCredentials>,
    ) -> Result<TokenResponse, OAuthError> {
        let grant_type = request
            .grant_type
            .as_deref()
            .filter(|g| !g.is_empty())
            .ok_or_else(|| OAuthError::invalid_request("grant_type is required"))?;
        let grant_type: GrantType = grant_type.parse().map_err(|()| {
            OAuthError::new(
                ErrorCode::UnsupportedGrantType,
                format!("grant type {grant_type:?} is not supported"),
            )
        })?;

        let client = self.authenticate_client(&request, basic).await?;

        if !client.allows_grant(grant_type) {
            return Err(OAuthError::new(
                ErrorCode::UnauthorizedClient,
                format!("client may not use the {grant_type} grant"),
            ));
        }

        match grant_type {
            GrantType::AuthorizationCode => self.exchange_code(&client, request).await,
            GrantType::RefreshToken => self.exchange_refresh_token(&client, request).await,
            GrantType::Password => self.exchange_password(&client, request).await,
        }
    }

    async fn authenticate_client(
        &self,
        request: &TokenRequest,
        basic: Option<ClientCredentials>,
    ) -> Result<OAuthClient, OAuthError> {
        let credentials = match basic {
            Some(credentials) => {
                if request
                    .client_id
                    .as_deref()
                    .is_some_and(|id| id != credentials.client_id)
                {
                    return Err(OAuthError::invalid_request(
                        "client_id does not match the authenticated client",
                    ));
                }
                credentials
            }
            None if self.config.oauth.allow_client_secret_in_params => {
                match (&request.client_id, &request.client_secret) {
                    (Some(id), Some(secret)) if !id.is_empty() => ClientCredentials {
                        client_id: id.clone(),
                        client_secret: SecretString::new(secret.as_str()),
                    },
                    _ => return Err(OAuthError::invalid_client()),
                }
            }
            None => return Err(OAuthError::invalid_client()),
        };

        let client = self
            .store
            .find_client(&credentials.client_id)
            .await?
            .ok_or_else(OAuthError::invalid_client)?;

        if !verify_token_hash(
            credentials.client_secret.expose_secret(),
            &client.secret_hash,
        ) {
            log::warn!(
                target: "portcullis::oauth",
                "msg=\"client secret mismatch\" client_id=\"{}\"",
                client.id
            );
            return Err(OAuthError::invalid_client());
        }

        Ok(client)
    }

    async fn exchange_code(
        &self,
        client: &OAuthClient,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuthError> {
        let code = request
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| OAuthError::invalid_request("code is required"))?;

        // consume first: whatever happens next, the code is spent
        let Some(grant) = self.store.consume_authorization(&hash_token(&code)).await? else {
            log::warn!(
                target: "portcullis::oauth",
                "msg=\"authorization code unknown or replayed\" client_id=\"{}\"",
                client.id
            );
            return Err(OAuthError::invalid_grant(
                "authorization code is invalid or has already been used",
            ));
        };

        if grant.client_id != client.id {
            log::warn!(
                target: "portcullis::oauth",
                "msg=\"authorization code presented by another client\" client_id=\"{}\" issued_to=\"{}\"",
                client.id,
                grant.client_id
            );
            return Err(OAuthError::invalid_grant(
                "authorization code was issued to another client",
            ));
        }

        if grant.is_expired(Utc::now()) {
            return Err(OAuthError::invalid_grant("authorization code has expired"));
        }

        let separator = self.config.oauth.redirect_uri_separator.as_str();
        let redirect_uri = match request.redirect_uri.as_deref().filter(|u| !u.is_empty()) {
            Some(uri) => Some(uri),
            None => client.sole_redirect_uri(separator),
        };
        if redirect_uri != Some(grant.redirect_uri.as_str()) {
            return Err(OAuthError::invalid_grant(
                "redirect_uri does not match the authorization request",
            ));
        }

        self.issue(
            client,
            &grant.user_id,
            &grant.scope,
            GrantType::AuthorizationCode,
        )
        .await
    }

    async fn exchange_refresh_token(
        &self,
        client: &OAuthClient,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuthError> {
        let token = request
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| OAuthError::invalid_request("refresh_token is required"))?;
        let token_hash = hash_token(&token);

        let existing = self
            .store
            .find_refresh_token(&token_hash)
            .await?
            .ok_or_else(|| OAuthError::invalid_grant("refresh token is invalid"))?;

        if existing.client_id != client.id {
            log::warn!(
                target: "portcullis::oauth",
                "msg=\"refresh token presented by another client\" client_id=\"{}\" issued_to=\"{}\"",
                client.id,
                existing.client_id
            );
            return Err(OAuthError::invalid_grant("refresh token is invalid"));
        }

        let requested = request
            .scope
            .as_deref()
            .map(normalize_scope)
            .filter(|s| !s.is_empty());
        let scope = match requested {
            Some(requested) if !is_scope_subset(&requested, &existing.scope) => {
                return Err(OAuthError::new(
                    ErrorCode::InvalidScope,
                    "requested scope exceeds the original grant",
                ));
            }
            Some(requested) => requested,
            None => existing.scope,
        };

        let Some(consumed) = self
            .store
            .consume_refresh_token(&token_hash, &client.id)
            .await?
        else {
            log::warn!(
                target: "portcullis::oauth",
                "msg=\"refresh token consumed concurrently\" client_id=\"{}\"",
                client.id
            );
            return Err(OAuthError::invalid_grant("refresh token is invalid"));
        };

        self.store
            .delete_access_tokens_for_refresh(&token_hash)
            .await?;

        let response = self
            .issue(client, &consumed.user_id, &scope, GrantType::RefreshToken)
            .await?;

        dispatch(AuthEvent::TokenRefreshed {
            client_id: client.id.clone(),
            user_id: consumed.user_id,
            at: Utc::now(),
        })
        .await;

        Ok(response)
    }

    async fn exchange_password(
        &self,
        client: &OAuthClient,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuthError> {
        let (Some(username), Some(password)) = (request.username, request.password) else {
            return Err(OAuthError::invalid_request(
                "username and password are required",
            ));
        };

        let check = check_credentials(
            self.store.as_ref(),
            self.hasher.as_ref(),
            &username,
            &password,
        )
        .await?;

        let user = match check {
            CredentialCheck::Valid(user) => user,
            failed => {
                log::warn!(
                    target: "portcullis::oauth",
                    "msg=\"password grant failed\" client_id=\"{}\" user_id=\"{username}\" reason=\"{}\"",
                    client.id,
                    failed.failure_reason().unwrap_or("invalid credentials")
                );
                return Err(OAuthError::invalid_grant(
                    "invalid resource owner credentials",
                ));
            }
        };

        let scope = normalize_scope(request.scope.as_deref().unwrap_or_default());
        self.issue(client, &user.id, &scope, GrantType::Password)
            .await
    }

    /// Stores and returns a fresh access/refresh token pair.
    async fn issue(
        &self,
        client: &OAuthClient,
        user_id: &str,
        scope: &str,
        grant_type: GrantType,
    ) -> Result<TokenResponse, OAuthError> {
        let now = Utc::now();
        let lifetime = self.config.oauth.access_token_lifetime;
        let access_token = self.generator.access_token();
        let refresh_token = self.generator.refresh_token();
        let refresh_token_hash = hash_token(refresh_token.expose_secret());

        self.store
            .create_refresh_token(RefreshToken {
                token_hash: refresh_token_hash.clone(),
                client_id: client.id.clone(),
                user_id: user_id.to_owned(),
                scope: scope.to_owned(),
                issued_at: now,
            })
            .await?;

        self.store
            .create_access_token(AccessToken {
                token_hash: hash_token(access_token.expose_secret()),
                client_id: client.id.clone(),
                user_id: user_id.to_owned(),
                scope: scope.to_owned(),
                issued_at: now,
                expires_at: now + lifetime,
                refresh_token_hash: Some(refresh_token_hash),
            })
            .await?;

        log::info!(
            target: "portcullis::oauth",
            "msg=\"tokens issued\" client_id=\"{}\" user_id=\"{user_id}\" grant_type={grant_type}",
            client.id
        );
        dispatch(AuthEvent::TokenIssued {
            client_id: client.id.clone(),
            user_id: user_id.to_owned(),
            grant_type,
            at: now,
        })
        .await;

        Ok(TokenResponse {
            access_token,
            token_type: TOKEN_TYPE,
            expires_in: lifetime.num_seconds(),
            refresh_token,
            scope: (!scope.is_empty()).then(|| scope.to_owned()),
        })
    }

    fn store_failure(&self, e: AuthError) -> OAuthError {
        log::error!(
            target: "portcullis::oauth",
            "msg=\"store failure\" error=\"{e}\""
        );
        OAuthError::Store(e)
    }
}
