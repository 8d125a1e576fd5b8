//! Request and response shapes of the authorize and token endpoints.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::SecretString;

/// Parameters of an authorization request.
///
/// A `POST` carries them in the form body, a `GET` in the query string;
/// body values override query values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizeRequest {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub response_type: Option<String>,
    pub state: Option<String>,
    /// The resource owner's decision, `authorize=true` on the consent form.
    pub authorize: bool,
}

impl AuthorizeRequest {
    pub fn from_query_and_form(query: Option<&str>, form: Option<&[u8]>) -> Self {
        let mut request = Self::default();
        if let Some(query) = query {
            request.merge(url::form_urlencoded::parse(query.as_bytes()));
        }
        if let Some(form) = form {
            request.merge(url::form_urlencoded::parse(form));
        }
        request
    }

    fn merge(&mut self, pairs: url::form_urlencoded::Parse<'_>) {
        for (name, value) in pairs {
            let value = value.into_owned();
            match name.as_ref() {
                "client_id" => self.client_id = Some(value),
                "redirect_uri" => self.redirect_uri = Some(value),
                "scope" => self.scope = Some(value),
                "response_type" => self.response_type = Some(value),
                "state" => self.state = Some(value),
                "authorize" => self.authorize = value == "true",
                _ => {}
            }
        }
    }
}

/// Form body of `POST /token`.
#[derive(Clone, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub refresh_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub scope: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("TokenRequest")
            .field("grant_type", &self.grant_type)
            .field("code", &redact(&self.code))
            .field("redirect_uri", &self.redirect_uri)
            .field("refresh_token", &redact(&self.refresh_token))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("scope", &self.scope)
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .finish()
    }
}

/// Client ID and secret presented to the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl ClientCredentials {
    /// Parses an `Authorization: Basic` value. ID and secret are
    /// form-urlencoded before base64 per RFC 6749 section 2.3.1.
    pub fn from_basic(header: &str) -> Option<Self> {
        let (scheme, encoded) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (id, secret) = decoded.split_once(':')?;

        let id = urlencoding::decode(&id.replace('+', " ")).ok()?.into_owned();
        let secret = urlencoding::decode(&secret.replace('+', " ")).ok()?.into_owned();
        if id.is_empty() {
            return None;
        }
        Some(Self {
            client_id: id,
            client_secret: SecretString::new(secret),
        })
    }
}

/// Successful token endpoint response.
#[derive(Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: SecretString,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub refresh_token: SecretString,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}

/// Normalizes a space-delimited scope string.
pub fn normalize_scope(scope: &str) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for item in scope.split_whitespace() {
        if !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen.join(" ")
}

/// Whether every scope in `requested` is part of `granted`.
pub fn is_scope_subset(requested: &str, granted: &str) -> bool {
    requested
        .split_whitespace()
        .all(|item| granted.split_whitespace().any(|g| g == item))
}
