//! Synchronizer-token CSRF protection.
//!
//! [`CsrfLayer`] keeps a random token in an HMAC-signed cookie and requires
//! every unsafe request (anything but `GET`, `HEAD`, `OPTIONS` and `TRACE`)
//! to echo it back, masked, in the configured header or form field.
//! Handlers receive the masked token as a [`CsrfToken`] extension to embed
//! in pages.
//!
//! A skip predicate decides per request whether validation applies. Requests
//! that already carry a bearer token cannot be forged cross-site, so the
//! router installs [`skip_if_bearer_authenticated`].
//!
//! ```rust,ignore
//! use portcullis::csrf::{CsrfLayer, skip_if_bearer_authenticated};
//!
//! let csrf = CsrfLayer::new(&csrf_key, CsrfConfig::default())?
//!     .skip_check(skip_if_bearer_authenticated);
//! let app = Router::new().route("/api/auth/logout", post(logout)).layer(csrf);
//! ```

pub mod token;

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::Json;
use axum::body::Body;
use axum::extract::{FromRequestParts, Request};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, SET_COOKIE, VARY};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use futures::future::BoxFuture;
use tower::{Layer, Service};

use self::token::RawToken;
use crate::AuthError;
use crate::config::CsrfConfig;
use crate::connection::is_tls;
use crate::crypto::constant_time_eq;
use crate::session::to_time_duration;
use crate::token::bearer_token;

/// Form bodies larger than this are not searched for a token.
pub const MAX_FORM_BODY: usize = 64 * 1024;

const MIN_KEY_LEN: usize = 32;

/// Decides whether a request skips token validation.
pub type SkipCheck = Arc<dyn Fn(&Parts) -> bool + Send + Sync>;

/// Skips validation for requests that arrive with their own bearer
/// credential, parsed the same way the authentication extractor parses it.
pub fn skip_if_bearer_authenticated(parts: &Parts) -> bool {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .is_some()
}

/// The masked token for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for CsrfToken
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

struct CsrfState {
    key: Vec<u8>,
    config: CsrfConfig,
    skip: Option<SkipCheck>,
    trust_forwarded_proto: bool,
}

impl CsrfState {
    fn cookie_token(&self, parts: &Parts) -> Option<RawToken> {
        let jar = CookieJar::from_headers(&parts.headers);
        let cookie = jar.get(&self.config.cookie_name)?;
        token::verify(cookie.value(), &self.key, &self.config.cookie_name)
    }

    fn cookie(&self, token: &RawToken, secure: bool) -> Option<HeaderValue> {
        let value = token::sign(token, &self.key, &self.config.cookie_name)?;
        let cookie = Cookie::build((self.config.cookie_name.clone(), value))
            .path(self.config.cookie_path.clone())
            .http_only(true)
            .secure(secure)
            .same_site(self.config.same_site.to_cookie())
            .max_age(to_time_duration(self.config.max_age))
            .build();
        HeaderValue::from_str(&cookie.to_string()).ok()
    }

    fn is_exempt(&self, parts: &Parts) -> bool {
        self.skip.as_ref().is_some_and(|skip| skip(parts))
    }

    /// Finds the submitted token in the header, falling back to the form
    /// body. Returns the body so the request can be rebuilt.
    async fn submitted_token(&self, parts: &Parts, body: Body) -> (Option<String>, Body) {
        if let Some(value) = parts
            .headers
            .get(self.config.header_name.as_str())
            .and_then(|v| v.to_str().ok())
        {
            return (Some(value.to_owned()), body);
        }

        let is_form = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        if !is_form {
            return (None, body);
        }

        match axum::body::to_bytes(body, MAX_FORM_BODY).await {
            Ok(bytes) => {
                let field = url::form_urlencoded::parse(&bytes)
                    .find(|(name, _)| name == self.config.field_name.as_str())
                    .map(|(_, value)| value.into_owned());
                (field, Body::from(bytes))
            }
            Err(_) => (None, Body::empty()),
        }
    }
}

fn is_safe(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

fn reject() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({
            "error": "CSRF token missing or invalid",
            "code": "CSRF_TOKEN_INVALID",
        })),
    )
        .into_response()
}

#[derive(Clone)]
pub struct CsrfLayer {
    state: Arc<CsrfState>,
}

impl CsrfLayer {
    /// # Errors
    ///
    /// Returns `AuthError::ConfigurationError` if `key` is shorter than 32 bytes.
    pub fn new(key: &[u8], config: CsrfConfig) -> Result<Self, AuthError> {
        if key.len() < MIN_KEY_LEN {
            return Err(AuthError::ConfigurationError(
                "csrf key must be at least 32 bytes".to_owned(),
            ));
        }
        Ok(Self {
            state: Arc::new(CsrfState {
                key: key.to_vec(),
                config,
                skip: None,
                trust_forwarded_proto: false,
            }),
        })
    }

    #[must_use]
    pub fn skip_check<F>(self, skip: F) -> Self
    where
        F: Fn(&Parts) -> bool + Send + Sync + 'static,
    {
        self.map_state(|state| state.skip = Some(Arc::new(skip)))
    }

    #[must_use]
    pub fn trust_forwarded_proto(self, trust: bool) -> Self {
        self.map_state(|state| state.trust_forwarded_proto = trust)
    }

    fn map_state(self, f: impl FnOnce(&mut CsrfState)) -> Self {
        let mut state = Arc::try_unwrap(self.state).unwrap_or_else(|shared| CsrfState {
            key: shared.key.clone(),
            config: shared.config.clone(),
            skip: shared.skip.clone(),
            trust_forwarded_proto: shared.trust_forwarded_proto,
        });
        f(&mut state);
        Self {
            state: Arc::new(state),
        }
    }
}

impl<S> Layer<S> for CsrfLayer {
    type Service = CsrfService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CsrfService {
            inner,
            state: Arc::clone(&self.state),
        }
    }
}

/// The service produced by [`CsrfLayer`].
#[derive(Clone)]
pub struct CsrfService<S> {
    inner: S,
    state: Arc<CsrfState>,
}

impl<S> Service<Request> for CsrfService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        // the clone may not be ready; keep the one poll_ready was called on
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let state = Arc::clone(&self.state);

        Box::pin(async move {
            let (mut parts, mut body) = req.into_parts();

            let secure = is_tls(
                &parts.headers,
                &parts.extensions,
                &parts.uri,
                state.trust_forwarded_proto,
            );
            let existing = state.cookie_token(&parts);
            let token = existing.unwrap_or_else(token::generate);
            let issue_cookie = existing.is_none().then(|| state.cookie(&token, secure)).flatten();

            if !is_safe(&parts.method) && !state.is_exempt(&parts) {
                let (submitted, restored) = state.submitted_token(&parts, body).await;
                body = restored;

                let valid = existing.is_some()
                    && submitted
                        .as_deref()
                        .and_then(token::unmask)
                        .is_some_and(|candidate| constant_time_eq(&candidate, &token));

                if !valid {
                    log::warn!(
                        target: "portcullis::csrf",
                        "msg=\"csrf validation failed\" method={} path=\"{}\" cookie_present={} token_present={}",
                        parts.method,
                        parts.uri.path(),
                        existing.is_some(),
                        submitted.is_some()
                    );
                    let mut response = reject();
                    finish(&mut response, issue_cookie);
                    return Ok(response);
                }
            }

            parts.extensions.insert(CsrfToken(token::mask(&token)));
            let mut response = inner.call(Request::from_parts(parts, body)).await?;
            finish(&mut response, issue_cookie);
            Ok(response)
        })
    }
}

fn finish(response: &mut Response, cookie: Option<HeaderValue>) {
    let headers = response.headers_mut();
    if let Some(cookie) = cookie {
        headers.append(SET_COOKIE, cookie);
    }
    headers.append(VARY, HeaderValue::from_static("Cookie"));
}
