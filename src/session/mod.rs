//! Encrypted session cookie.
//!
//! The cookie carries a [`SessionCookie`] as JSON, encrypted and
//! authenticated with the gateway's cookie [`Key`] through
//! [`PrivateCookieJar`]. Any decryption or parse failure reads as "no
//! cookie".

pub mod bridge;

use std::fmt;

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar};
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;

pub use bridge::{SessionBridge, SessionBridgeLayer, bridge_headers};

/// Plaintext payload of the session cookie.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub session_id: String,
    pub session_secret: String,
}

impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookie")
            .field("session_id", &self.session_id)
            .field("session_secret", &"[REDACTED]")
            .finish()
    }
}

impl SessionCookie {
    /// Reads and decrypts the payload from a jar.
    pub fn from_jar(jar: &PrivateCookieJar, cookie_name: &str) -> Option<Self> {
        let cookie = jar.get(cookie_name)?;
        match serde_json::from_str(cookie.value()) {
            Ok(payload) => Some(payload),
            Err(e) => {
                log::debug!(
                    target: "portcullis::session",
                    "msg=\"session cookie payload malformed\" error=\"{e}\""
                );
                None
            }
        }
    }

    /// Reads the payload straight from request headers.
    pub fn from_headers(headers: &HeaderMap, key: &Key, cookie_name: &str) -> Option<Self> {
        let jar = PrivateCookieJar::from_headers(headers, key.clone());
        Self::from_jar(&jar, cookie_name)
    }

    /// Builds the plaintext cookie; add it to a [`PrivateCookieJar`] to
    /// encrypt it.
    pub fn to_cookie(&self, config: &SessionConfig, secure: bool) -> Cookie<'static> {
        let value = serde_json::json!({
            "session_id": self.session_id,
            "session_secret": self.session_secret,
        })
        .to_string();

        Cookie::build((config.cookie_name.clone(), value))
            .path(config.cookie_path.clone())
            .http_only(true)
            .secure(secure)
            .same_site(config.same_site.to_cookie())
            .max_age(to_time_duration(config.session_lifetime))
            .build()
    }
}

/// A cookie matching the session cookie's name and path, for
/// [`PrivateCookieJar::remove`].
pub fn removal_cookie(config: &SessionConfig) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), ""))
        .path(config.cookie_path.clone())
        .build()
}

pub(crate) fn to_time_duration(duration: chrono::Duration) -> time::Duration {
    time::Duration::seconds(duration.num_seconds())
}
