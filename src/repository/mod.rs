//! Credential store traits and data types.
//!
//! The gateway never talks to a database directly. Everything it persists
//! goes through these traits; implement them for your own backend.
//!
//! # Traits
//!
//! | Trait | Description |
//! |-------|-------------|
//! | [`UserRepository`] | User lookup |
//! | [`SessionRepository`] | Browser sessions |
//! | [`ClientRepository`] | Registered OAuth clients |
//! | [`OAuthRepository`] | Authorization codes, access and refresh tokens |
//! | [`CredentialStore`] | All of the above |
//!
//! # Atomicity
//!
//! [`OAuthRepository::consume_authorization`] and
//! [`OAuthRepository::consume_refresh_token`] are conditional updates. An
//! implementation must guarantee that concurrent callers racing on the same
//! code or refresh token see at most one success. The gateway holds no lock
//! of its own around them.
//!
//! [`InMemoryCredentialStore`] implements every trait and is intended for
//! development and tests.

mod client;
mod memory;
mod oauth;
mod seed;
mod session;
mod user;

pub use client::{ClientRepository, GrantType, OAuthClient};
pub use memory::InMemoryCredentialStore;
pub use oauth::{AccessToken, AuthorizationGrant, OAuthRepository, RefreshToken};
pub use seed::{SeedClient, SeedData, SeedUser};
pub use session::{Session, SessionRepository};
pub use user::{AuthUser, UserRepository};

/// Everything the authorization server needs from persistence.
pub trait CredentialStore:
    UserRepository + SessionRepository + ClientRepository + OAuthRepository
{
}

impl<T> CredentialStore for T where
    T: UserRepository + SessionRepository + ClientRepository + OAuthRepository
{
}
