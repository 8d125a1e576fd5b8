use chrono::{DateTime, Utc};

use crate::repository::GrantType;

/// Events emitted by the gateway.
///
/// Events are always fired. If no listeners are registered, they are
/// silently ignored. Register listeners via
/// [`register_event_listeners`](crate::register_event_listeners).
#[derive(Debug, Clone)]
pub enum AuthEvent {
    // browser session
    LoginSuccess {
        user_id: String,
        at: DateTime<Utc>,
    },
    LoginFailed {
        user_id: String,
        reason: String,
        at: DateTime<Utc>,
    },
    LogoutSuccess {
        user_id: String,
        at: DateTime<Utc>,
    },

    // oauth
    AuthorizationGranted {
        client_id: String,
        user_id: String,
        scope: String,
        at: DateTime<Utc>,
    },
    AuthorizationDenied {
        client_id: String,
        user_id: String,
        at: DateTime<Utc>,
    },
    TokenIssued {
        client_id: String,
        user_id: String,
        grant_type: GrantType,
        at: DateTime<Utc>,
    },
    TokenRefreshed {
        client_id: String,
        user_id: String,
        at: DateTime<Utc>,
    },
}

impl AuthEvent {
    /// Returns a dot-separated event name for logging/tracing.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoginSuccess { .. } => "auth.login.success",
            Self::LoginFailed { .. } => "auth.login.failed",
            Self::LogoutSuccess { .. } => "auth.logout.success",
            Self::AuthorizationGranted { .. } => "oauth.authorization.granted",
            Self::AuthorizationDenied { .. } => "oauth.authorization.denied",
            Self::TokenIssued { .. } => "oauth.token.issued",
            Self::TokenRefreshed { .. } => "oauth.token.refreshed",
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Self::LoginSuccess { user_id, .. }
            | Self::LoginFailed { user_id, .. }
            | Self::LogoutSuccess { user_id, .. }
            | Self::AuthorizationGranted { user_id, .. }
            | Self::AuthorizationDenied { user_id, .. }
            | Self::TokenIssued { user_id, .. }
            | Self::TokenRefreshed { user_id, .. } => user_id,
        }
    }

    /// The OAuth client involved, if any.
    pub fn client_id(&self) -> Option<&str> {
        match self {
            Self::AuthorizationGranted { client_id, .. }
            | Self::AuthorizationDenied { client_id, .. }
            | Self::TokenIssued { client_id, .. }
            | Self::TokenRefreshed { client_id, .. } => Some(client_id),
            Self::LoginSuccess { .. } | Self::LoginFailed { .. } | Self::LogoutSuccess { .. } => {
                None
            }
        }
    }

    /// Login failures and denied authorizations.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::LoginFailed { .. } | Self::AuthorizationDenied { .. }
        )
    }

    /// The one event-specific field worth logging, as `(name, value)`.
    pub fn detail(&self) -> Option<(&'static str, &str)> {
        match self {
            Self::LoginFailed { reason, .. } => Some(("reason", reason.as_str())),
            Self::AuthorizationGranted { scope, .. } => Some(("scope", scope.as_str())),
            Self::TokenIssued { grant_type, .. } => Some(("grant_type", grant_type.as_str())),
            Self::LoginSuccess { .. }
            | Self::LogoutSuccess { .. }
            | Self::AuthorizationDenied { .. }
            | Self::TokenRefreshed { .. } => None,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::LoginSuccess { at, .. }
            | Self::LoginFailed { at, .. }
            | Self::LogoutSuccess { at, .. }
            | Self::AuthorizationGranted { at, .. }
            | Self::AuthorizationDenied { at, .. }
            | Self::TokenIssued { at, .. }
            | Self::TokenRefreshed { at, .. } => *at,
        }
    }
}
