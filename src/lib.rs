//! Authentication gateway for axum applications.
//!
//! `portcullis` bundles the pieces a browser-facing OAuth2 provider needs:
//!
//! - [`session::bridge`] turns an encrypted session cookie into a bearer
//!   credential so downstream code only ever sees `Authorization` headers.
//! - [`csrf`] guards state-changing requests with a synchronizer token.
//! - [`oauth::AuthorizationServer`] runs login, logout and the
//!   `authorization_code`, `refresh_token` and `password` grants.
//! - [`token`] generates codes and tokens.
//! - [`api`] mounts everything on an axum [`Router`](axum::Router).
//!
//! Persistence goes through the [`repository::CredentialStore`] traits.

pub mod actions;
pub mod api;
pub mod config;
pub mod connection;
pub mod crypto;
pub mod csrf;
pub mod events;
pub mod oauth;
pub mod repository;
pub mod session;
pub mod token;

pub use config::GatewayConfig;
pub use crypto::SecretString;
pub use events::register_event_listeners;
pub use repository::{CredentialStore, InMemoryCredentialStore};
pub use token::{RandomTokenGenerator, TokenGenerator};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid user ID or password")]
    InvalidCredentials,
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Session has expired")]
    SessionExpired,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Invalid token")]
    TokenInvalid,
    #[error("User not found")]
    UserNotFound,
    #[error("Failed to hash password")]
    PasswordHashError,
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl AuthError {
    /// Failures of the gateway itself rather than of the caller's credentials.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::PasswordHashError | Self::ConfigurationError(_) | Self::DatabaseError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_display() {
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "Invalid user ID or password"
        );
        assert_eq!(
            AuthError::DatabaseError("Lock poisoned".to_owned()).to_string(),
            "Database error: Lock poisoned"
        );
    }

    #[test]
    fn test_is_internal() {
        assert!(AuthError::DatabaseError(String::new()).is_internal());
        assert!(!AuthError::SessionExpired.is_internal());
    }
}
