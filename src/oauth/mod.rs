//! OAuth2 authorization server.
//!
//! Supports the authorization code, refresh token and resource owner
//! password grants. Codes are single use and short lived; refresh tokens
//! rotate on every exchange.

mod error;
mod request;
mod server;

pub use error::{ErrorBody, ErrorCode, OAuthError};
pub use request::{
    AuthorizeRequest, ClientCredentials, TokenRequest, TokenResponse, is_scope_subset,
    normalize_scope,
};
pub use server::{AuthorizationServer, AuthorizeRejection, TOKEN_TYPE, ValidatedAuthorization};
