use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::AuthError;

/// OAuth2 grant types the token endpoint understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    RefreshToken,
    Password,
}

impl GrantType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
            Self::Password => "password",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "refresh_token" => Ok(Self::RefreshToken),
            "password" => Ok(Self::Password),
            _ => Err(()),
        }
    }
}

/// A registered OAuth client.
///
/// `redirect_uris` holds every registered URI in one string joined by the
/// configured separator; use [`OAuthClient::redirect_uris`] to iterate them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthClient {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub secret_hash: String,
    pub redirect_uris: String,
    pub grants: Vec<GrantType>,
    /// Approve authorization requests without showing a consent page.
    #[serde(default)]
    pub skip_authorization: bool,
}

impl OAuthClient {
    pub fn redirect_uris<'a>(&'a self, separator: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.redirect_uris
            .split(separator)
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
    }

    /// Exact match against one of the registered URIs.
    pub fn has_redirect_uri(&self, uri: &str, separator: &str) -> bool {
        self.redirect_uris(separator).any(|registered| registered == uri)
    }

    /// The registered URI when exactly one is registered.
    pub fn sole_redirect_uri<'a>(&'a self, separator: &'a str) -> Option<&'a str> {
        let mut uris = self.redirect_uris(separator);
        match (uris.next(), uris.next()) {
            (Some(uri), None) => Some(uri),
            _ => None,
        }
    }

    pub fn allows_grant(&self, grant: GrantType) -> bool {
        self.grants.contains(&grant)
    }
}

#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn find_client(&self, id: &str) -> Result<Option<OAuthClient>, AuthError>;
}
