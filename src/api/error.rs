use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::found;
use super::types::ErrorResponse;
use crate::AuthError;
use crate::oauth::{AuthorizeRejection, OAuthError};

/// converts `AuthError` into appropriate HTTP responses
#[derive(Debug)]
pub struct AppError(pub AuthError);

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AuthError::InvalidCredentials
            | AuthError::Unauthenticated
            | AuthError::SessionExpired
            | AuthError::TokenExpired
            | AuthError::TokenInvalid
            | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
            AuthError::PasswordHashError
            | AuthError::ConfigurationError(_)
            | AuthError::DatabaseError(_) => {
                log::error!(
                    target: "portcullis",
                    "msg=\"request failed\" error=\"{}\"",
                    self.0
                );
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(ErrorResponse::from(self.0))).into_response()
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Protocol { .. } => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self.body())).into_response()
    }
}

impl IntoResponse for AuthorizeRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Direct(err) => err.into_response(),
            Self::Redirect { .. } => found(&self.location().unwrap_or_default()),
        }
    }
}
