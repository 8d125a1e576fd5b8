//! Token generation and the bearer credential wire format.
//!
//! Every credential the gateway hands out is a dot-separated string whose
//! first segment names its kind:
//!
//! | Kind | Format |
//! |------|--------|
//! | session bearer | `SESSION.<session_id>.<session_secret>` |
//! | authorization code | `AC.<random>` |
//! | access token | `AA.<random>` |
//! | refresh token | `RT.<random>` |

use std::fmt;

use crate::SecretString;
use crate::crypto::{DEFAULT_TOKEN_LENGTH, generate_token};

const SEPARATOR: char = '.';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Session,
    AuthorizationCode,
    AccessToken,
    RefreshToken,
}

impl TokenKind {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Session => "SESSION",
            Self::AuthorizationCode => "AC",
            Self::AccessToken => "AA",
            Self::RefreshToken => "RT",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "SESSION" => Some(Self::Session),
            "AC" => Some(Self::AuthorizationCode),
            "AA" => Some(Self::AccessToken),
            "RT" => Some(Self::RefreshToken),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Joins a kind and its parts into a credential string.
pub fn join_token(kind: TokenKind, parts: &[&str]) -> String {
    let mut token = kind.prefix().to_owned();
    for part in parts {
        token.push(SEPARATOR);
        token.push_str(part);
    }
    token
}

/// Splits a credential into its kind and remaining parts.
///
/// Returns `None` for unknown kinds or empty parts.
pub fn split_token(token: &str) -> Option<(TokenKind, Vec<&str>)> {
    let mut segments = token.split(SEPARATOR);
    let kind = TokenKind::from_prefix(segments.next()?)?;
    let parts: Vec<&str> = segments.collect();
    if parts.is_empty() || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some((kind, parts))
}

/// Builds the bearer value the cookie bridge injects for a browser session.
pub fn session_bearer(session_id: &str, session_secret: &str) -> String {
    join_token(TokenKind::Session, &[session_id, session_secret])
}

/// The credential in an `Authorization` header value when the scheme is
/// `Bearer`, matched case-insensitively. Empty credentials yield `None`.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, credential) = header_value.split_once(' ')?;
    let credential = credential.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !credential.is_empty()).then_some(credential)
}

/// A parsed `Authorization: Bearer` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BearerCredential {
    Session { id: String, secret: SecretString },
    AccessToken(SecretString),
}

impl BearerCredential {
    /// Parses a bearer value. Codes and refresh tokens are not bearer
    /// credentials and yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let (kind, parts) = split_token(value)?;
        match (kind, parts.as_slice()) {
            (TokenKind::Session, [id, secret]) => Some(Self::Session {
                id: (*id).to_owned(),
                secret: SecretString::new(*secret),
            }),
            (TokenKind::AccessToken, [_]) => Some(Self::AccessToken(SecretString::new(value))),
            _ => None,
        }
    }
}

/// Source of unguessable codes, tokens and session credentials.
pub trait TokenGenerator: Send + Sync {
    fn authorization_code(&self) -> SecretString;
    fn access_token(&self) -> SecretString;
    fn refresh_token(&self) -> SecretString;
    /// Returns a fresh `(session_id, session_secret)` pair.
    fn session_credentials(&self) -> (String, SecretString);
}

/// [`TokenGenerator`] backed by the OS random source.
#[derive(Debug, Clone)]
pub struct RandomTokenGenerator {
    length: usize,
}

impl RandomTokenGenerator {
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    fn random(&self, kind: TokenKind) -> SecretString {
        SecretString::new(join_token(kind, &[&generate_token(self.length)]))
    }
}

impl Default for RandomTokenGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_LENGTH)
    }
}

impl TokenGenerator for RandomTokenGenerator {
    fn authorization_code(&self) -> SecretString {
        self.random(TokenKind::AuthorizationCode)
    }

    fn access_token(&self) -> SecretString {
        self.random(TokenKind::AccessToken)
    }

    fn refresh_token(&self) -> SecretString {
        self.random(TokenKind::RefreshToken)
    }

    fn session_credentials(&self) -> (String, SecretString) {
        (
            generate_token(self.length),
            SecretString::new(generate_token(self.length)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_and_split() {
        let token = join_token(TokenKind::Session, &["abc", "def"]);
        assert_eq!(token, "SESSION.abc.def");

        let (kind, parts) = split_token(&token).unwrap();
        assert_eq!(kind, TokenKind::Session);
        assert_eq!(parts, vec!["abc", "def"]);
    }

    #[test]
    fn test_split_rejects_garbage() {
        assert!(split_token("").is_none());
        assert!(split_token("SESSION").is_none());
        assert!(split_token("SESSION..x").is_none());
        assert!(split_token("XX.abc").is_none());
    }

    #[test]
    fn test_generated_tokens_have_kind_prefix() {
        let generator = RandomTokenGenerator::default();

        let code = generator.authorization_code();
        let access = generator.access_token();
        let refresh = generator.refresh_token();

        assert!(code.expose_secret().starts_with("AC."));
        assert!(access.expose_secret().starts_with("AA."));
        assert!(refresh.expose_secret().starts_with("RT."));
        assert_eq!(access.len(), 3 + DEFAULT_TOKEN_LENGTH);
        assert_ne!(generator.access_token(), access);
    }

    #[test]
    fn test_session_credentials_are_distinct() {
        let generator = RandomTokenGenerator::new(24);
        let (id, secret) = generator.session_credentials();
        assert_eq!(id.len(), 24);
        assert_eq!(secret.len(), 24);
        assert_ne!(id, secret.expose_secret());
    }

    #[test]
    fn test_bearer_token_scheme_is_case_insensitive() {
        assert_eq!(bearer_token("Bearer AA.x"), Some("AA.x"));
        assert_eq!(bearer_token("bearer AA.x"), Some("AA.x"));
        assert_eq!(bearer_token("BeArEr  AA.x "), Some("AA.x"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearerx AA.x"), None);
        assert_eq!(bearer_token("Basic YzE6cw=="), None);
    }

    #[test]
    fn test_parse_session_bearer() {
        let bearer = session_bearer("sid", "ssecret");
        assert_eq!(
            BearerCredential::parse(&bearer),
            Some(BearerCredential::Session {
                id: "sid".to_owned(),
                secret: SecretString::new("ssecret"),
            })
        );
    }

    #[test]
    fn test_parse_access_token_bearer() {
        assert_eq!(
            BearerCredential::parse("AA.xyz"),
            Some(BearerCredential::AccessToken(SecretString::new("AA.xyz")))
        );
    }

    #[test]
    fn test_parse_rejects_non_bearer_kinds() {
        assert!(BearerCredential::parse("RT.xyz").is_none());
        assert!(BearerCredential::parse("AC.xyz").is_none());
        assert!(BearerCredential::parse("SESSION.only-one-part").is_none());
        assert!(BearerCredential::parse("AA.a.b").is_none());
    }
}
