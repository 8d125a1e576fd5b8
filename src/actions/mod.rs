//! Session operations behind the login API.
//!
//! Each action borrows the store it needs and exposes a single `execute`.
//! [`AuthorizationServer`](crate::oauth::AuthorizationServer) wires them up;
//! use them directly when embedding the gateway's logic elsewhere.

mod authenticate;
mod credentials;
mod login;
mod logout;
mod prune_expired;

pub use authenticate::{AuthenticateAction, Credential, Principal};
pub use credentials::{CredentialCheck, check_credentials};
pub use login::{LoginAction, LoginOutcome};
pub use logout::LogoutAction;
pub use prune_expired::{PruneExpiredSessionsAction, PruneExpiredTokensAction};
