//! Configuration for the gateway.
//!
//! Every section has production defaults; override only what you need.
//!
//! ```rust
//! use portcullis::config::{GatewayConfig, SessionConfig};
//! use chrono::Duration;
//!
//! let config = GatewayConfig {
//!     mount: "/auth".to_owned(),
//!     session: SessionConfig {
//!         session_lifetime: Duration::days(1),
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! assert_eq!(config.mount_path(), "/auth");
//! ```

use axum_extra::extract::cookie;
use chrono::Duration;
use serde::Serialize;

use crate::AuthError;
use crate::crypto::DEFAULT_TOKEN_LENGTH;

/// Cookie `SameSite` policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    None,
    #[default]
    Lax,
    Strict,
}

impl SameSite {
    pub fn to_cookie(self) -> cookie::SameSite {
        match self {
            Self::None => cookie::SameSite::None,
            Self::Lax => cookie::SameSite::Lax,
            Self::Strict => cookie::SameSite::Strict,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Path prefix every route is mounted under. `""` or `"/"` mounts at the root.
    ///
    /// Default: `/oauth`
    pub mount: String,

    pub ui: UiConfig,

    pub session: SessionConfig,

    pub csrf: CsrfConfig,

    pub oauth: OAuthConfig,

    /// Length of the random part of generated tokens (in characters).
    ///
    /// Default: 32
    pub token_length: usize,

    /// Honour `X-Forwarded-Proto` when deciding whether a request came in
    /// over TLS. Only enable behind a proxy that sets the header.
    ///
    /// Default: false
    pub trust_forwarded_proto: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mount: "/oauth".to_owned(),
            ui: UiConfig::default(),
            session: SessionConfig::default(),
            csrf: CsrfConfig::default(),
            oauth: OAuthConfig::default(),
            token_length: DEFAULT_TOKEN_LENGTH,
            trust_forwarded_proto: false,
        }
    }
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mount with a leading slash and no trailing slash. The root mount
    /// is returned as `""`.
    pub fn mount_path(&self) -> String {
        let trimmed = self.mount.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        }
    }

    /// Checks the configuration for values the gateway cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ConfigurationError` naming the first offending field.
    pub fn validate(&self) -> Result<(), AuthError> {
        let invalid = |msg: &str| Err(AuthError::ConfigurationError(msg.to_owned()));

        if self.mount.contains(['?', '#', ' ']) {
            return invalid("mount must be a plain path");
        }
        if !(16..=128).contains(&self.token_length) {
            return invalid("token_length must be between 16 and 128");
        }
        if !is_cookie_name(&self.session.cookie_name) {
            return invalid("session.cookie_name is not a valid cookie name");
        }
        if !is_cookie_name(&self.csrf.cookie_name) {
            return invalid("csrf.cookie_name is not a valid cookie name");
        }
        if self.session.cookie_name == self.csrf.cookie_name {
            return invalid("session and csrf cookies must have different names");
        }
        if self.csrf.header_name.is_empty() || self.csrf.field_name.is_empty() {
            return invalid("csrf.header_name and csrf.field_name must not be empty");
        }
        if self.session.session_lifetime <= Duration::zero() {
            return invalid("session.session_lifetime must be positive");
        }
        if self.oauth.authorization_code_lifetime <= Duration::zero()
            || self.oauth.access_token_lifetime <= Duration::zero()
        {
            return invalid("oauth lifetimes must be positive");
        }
        if self.oauth.redirect_uri_separator.is_empty() {
            return invalid("oauth.redirect_uri_separator must not be empty");
        }
        Ok(())
    }
}

fn is_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

/// Values handed to the browser application inside the page shell.
#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub title: String,
    pub language: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            title: "Sign in".to_owned(),
            language: "en".to_owned(),
        }
    }
}

/// Session cookie settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Default: `_session`
    pub cookie_name: String,

    /// Default: `/`
    pub cookie_path: String,

    /// `Lax` by default: the authorize redirect arrives as a cross-site
    /// top-level navigation and must still carry the cookie.
    pub same_site: SameSite,

    /// Default: 14 days
    pub session_lifetime: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "_session".to_owned(),
            cookie_path: "/".to_owned(),
            same_site: SameSite::Lax,
            session_lifetime: Duration::days(14),
        }
    }
}

/// CSRF cookie and token transport settings.
#[derive(Debug, Clone)]
pub struct CsrfConfig {
    /// Default: `_csrf`
    pub cookie_name: String,

    /// Default: `X-CSRF-Token`
    pub header_name: String,

    /// Form field checked for urlencoded bodies. Default: `_csrf`
    pub field_name: String,

    /// Default: `/`
    pub cookie_path: String,

    pub same_site: SameSite,

    /// Default: 12 hours
    pub max_age: Duration,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            cookie_name: "_csrf".to_owned(),
            header_name: "X-CSRF-Token".to_owned(),
            field_name: "_csrf".to_owned(),
            cookie_path: "/".to_owned(),
            same_site: SameSite::Lax,
            max_age: Duration::hours(12),
        }
    }
}

/// Authorization server settings.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Default: 5 minutes
    pub authorization_code_lifetime: Duration,

    /// Default: 1 hour
    pub access_token_lifetime: Duration,

    /// Accept `client_id`/`client_secret` in the token request body as well
    /// as HTTP Basic. Default: true
    pub allow_client_secret_in_params: bool,

    /// Separator between a client's registered redirect URIs. Default: `"\n"`
    pub redirect_uri_separator: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            authorization_code_lifetime: Duration::minutes(5),
            access_token_lifetime: Duration::hours(1),
            allow_client_secret_in_params: true,
            redirect_uri_separator: "\n".to_owned(),
        }
    }
}
