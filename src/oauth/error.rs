use std::fmt;

use serde::Serialize;

use crate::AuthError;

/// OAuth2 error codes (RFC 6749 section 4.1.2.1 and 5.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    UnauthorizedClient,
    UnsupportedGrantType,
    UnsupportedResponseType,
    InvalidScope,
    AccessDenied,
    ServerError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::InvalidScope => "invalid_scope",
            Self::AccessDenied => "access_denied",
            Self::ServerError => "server_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OAuthError {
    /// The caller sent something the protocol rejects. Safe to show.
    #[error("{code}: {description}")]
    Protocol {
        code: ErrorCode,
        description: String,
    },
    /// The store failed. Details stay in the logs.
    #[error("store failure: {0}")]
    Store(#[from] AuthError),
}

impl OAuthError {
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self::Protocol {
            code,
            description: description.into(),
        }
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, description)
    }

    pub fn invalid_client() -> Self {
        Self::new(ErrorCode::InvalidClient, "client authentication failed")
    }

    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidGrant, description)
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Protocol { code, .. } => *code,
            Self::Store(_) => ErrorCode::ServerError,
        }
    }

    /// The JSON body sent to the client.
    pub fn body(&self) -> ErrorBody {
        match self {
            Self::Protocol { code, description } => ErrorBody {
                error: *code,
                error_description: Some(description.clone()),
            },
            Self::Store(_) => ErrorBody {
                error: ErrorCode::ServerError,
                error_description: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_body() {
        let err = OAuthError::invalid_grant("authorization code is invalid");
        let json = serde_json::to_value(err.body()).unwrap();
        assert_eq!(json["error"], "invalid_grant");
        assert_eq!(json["error_description"], "authorization code is invalid");
    }

    #[test]
    fn test_store_error_hides_detail() {
        let err = OAuthError::from(AuthError::DatabaseError("connection refused".to_owned()));
        assert_eq!(err.code(), ErrorCode::ServerError);

        let json = serde_json::to_string(&err.body()).unwrap();
        assert_eq!(json, r#"{"error":"server_error"}"#);
    }

    #[test]
    fn test_code_strings_match_serde() {
        for code in [
            ErrorCode::InvalidRequest,
            ErrorCode::UnauthorizedClient,
            ErrorCode::UnsupportedResponseType,
            ErrorCode::AccessDenied,
        ] {
            let json = serde_json::to_value(code).unwrap();
            assert_eq!(json, code.as_str());
        }
    }
}
