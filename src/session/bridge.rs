//! Cookie to bearer bridge.
//!
//! Browser requests authenticate with the encrypted session cookie, API
//! clients with `Authorization: Bearer`. [`SessionBridgeLayer`] rewrites the
//! former into the latter so everything behind it deals with bearer
//! credentials only.
//!
//! ```rust,ignore
//! use portcullis::session::SessionBridgeLayer;
//!
//! let app = Router::new()
//!     .route("/api/me", get(me))
//!     .layer(SessionBridgeLayer::new(key, "_session"));
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue, Request};
use axum_extra::extract::cookie::Key;
use tower::{Layer, Service};

use super::SessionCookie;
use crate::token::session_bearer;

/// Injects `Authorization: Bearer SESSION.<id>.<secret>` when the request
/// has no `Authorization` header and carries a valid session cookie.
///
/// Returns whether a header was injected. A missing, tampered or malformed
/// cookie leaves the headers untouched and the request anonymous. The cookie
/// itself is never modified.
pub fn bridge_headers(headers: &mut HeaderMap, key: &Key, cookie_name: &str) -> bool {
    if headers.contains_key(AUTHORIZATION) {
        return false;
    }

    let Some(cookie) = SessionCookie::from_headers(headers, key, cookie_name) else {
        return false;
    };

    if cookie.session_secret.is_empty() {
        return false;
    }

    let bearer = format!(
        "Bearer {}",
        session_bearer(&cookie.session_id, &cookie.session_secret)
    );
    match HeaderValue::from_str(&bearer) {
        Ok(value) => {
            headers.insert(AUTHORIZATION, value);
            true
        }
        Err(_) => {
            log::debug!(
                target: "portcullis::session",
                "msg=\"session cookie not representable as header\""
            );
            false
        }
    }
}

#[derive(Clone)]
pub struct SessionBridgeLayer {
    key: Key,
    cookie_name: Arc<str>,
}

impl SessionBridgeLayer {
    #[must_use]
    pub fn new(key: Key, cookie_name: impl Into<String>) -> Self {
        Self {
            key,
            cookie_name: Arc::from(cookie_name.into()),
        }
    }
}

impl<S> Layer<S> for SessionBridgeLayer {
    type Service = SessionBridge<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionBridge {
            inner,
            key: self.key.clone(),
            cookie_name: Arc::clone(&self.cookie_name),
        }
    }
}

/// The service produced by [`SessionBridgeLayer`].
#[derive(Clone)]
pub struct SessionBridge<S> {
    inner: S,
    key: Key,
    cookie_name: Arc<str>,
}

impl<S, B> Service<Request<B>> for SessionBridge<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        bridge_headers(req.headers_mut(), &self.key, &self.cookie_name);
        self.inner.call(req)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::header::{COOKIE, SET_COOKIE};
    use axum::response::IntoResponse;
    use axum_extra::extract::cookie::PrivateCookieJar;

    use super::*;
    use crate::config::SessionConfig;

    fn cookie_header(key: &Key, payload: &SessionCookie) -> HeaderValue {
        let cookie = payload.to_cookie(&SessionConfig::default(), false);
        let response = PrivateCookieJar::new(key.clone()).add(cookie).into_response();
        let set_cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        HeaderValue::from_str(set_cookie.split(';').next().unwrap()).unwrap()
    }

    fn payload(secret: &str) -> SessionCookie {
        SessionCookie {
            session_id: "sid".to_owned(),
            session_secret: secret.to_owned(),
        }
    }

    #[test]
    fn test_injects_session_bearer() {
        let key = Key::generate();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie_header(&key, &payload("ssecret")));

        assert!(bridge_headers(&mut headers, &key, "_session"));
        assert_eq!(
            headers.get(AUTHORIZATION).unwrap(),
            "Bearer SESSION.sid.ssecret"
        );
    }

    #[test]
    fn test_existing_authorization_untouched() {
        let key = Key::generate();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie_header(&key, &payload("ssecret")));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer AA.token"));

        assert!(!bridge_headers(&mut headers, &key, "_session"));
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer AA.token");
    }

    #[test]
    fn test_tampered_cookie_stays_anonymous() {
        let key = Key::generate();
        let valid = cookie_header(&key, &payload("ssecret"));
        let mut tampered: Vec<char> = valid.to_str().unwrap().chars().collect();
        let mid = tampered.len() / 2 + 5;
        tampered[mid] = if tampered[mid] == 'A' { 'B' } else { 'A' };
        let tampered: String = tampered.into_iter().collect();

        for value in [tampered.as_str(), "_session=garbage", "_session="] {
            let mut headers = HeaderMap::new();
            headers.insert(COOKIE, HeaderValue::from_str(value).unwrap());
            assert!(!bridge_headers(&mut headers, &key, "_session"));
            assert!(headers.get(AUTHORIZATION).is_none());
        }
    }

    #[test]
    fn test_wrong_key_stays_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie_header(&Key::generate(), &payload("ssecret")));

        assert!(!bridge_headers(&mut headers, &Key::generate(), "_session"));
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_empty_secret_not_bridged() {
        let key = Key::generate();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie_header(&key, &payload("")));

        assert!(!bridge_headers(&mut headers, &key, "_session"));
    }

    #[test]
    fn test_plaintext_cookie_rejected() {
        let key = Key::generate();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static(r#"_session={"session_id":"sid","session_secret":"s"}"#),
        );

        assert!(!bridge_headers(&mut headers, &key, "_session"));
    }
}
