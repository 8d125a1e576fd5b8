//! Shared fixtures for the end-to-end tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, Request, Response, StatusCode};
use axum_extra::extract::cookie::Key;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http_body_util::BodyExt;
use portcullis::api::{AppState, gateway_routes};
use portcullis::crypto::Argon2Hasher;
use portcullis::oauth::AuthorizationServer;
use portcullis::repository::SeedData;
use portcullis::{GatewayConfig, InMemoryCredentialStore, RandomTokenGenerator};
use tower::ServiceExt;

pub const CSRF_KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

pub const SEED: &str = r#"{
    "users": [
        { "id": "alice", "name": "Alice", "email": "alice@example.com", "password": "wonderland" }
    ],
    "clients": [
        {
            "id": "c1", "name": "Client One", "secret": "s3cret",
            "redirect_uris": ["https://app/cb"],
            "grants": ["authorization_code", "refresh_token", "password"]
        },
        {
            "id": "trusted", "secret": "trusted-secret",
            "redirect_uris": ["https://trusted/cb"],
            "grants": ["authorization_code"],
            "skip_authorization": true
        }
    ]
}"#;

pub struct TestApp {
    pub router: Router,
    pub store: InMemoryCredentialStore,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(GatewayConfig::default())
    }

    pub fn with_config(config: GatewayConfig) -> Self {
        // cheap parameters; the hashes embed them so verification matches
        let hasher = Argon2Hasher::new(1024, 1, 1).unwrap();
        let store = InMemoryCredentialStore::new();
        SeedData::from_json(SEED)
            .unwrap()
            .apply(&store, &hasher, &config.oauth.redirect_uri_separator)
            .unwrap();

        let server = AuthorizationServer::new(
            Arc::new(store.clone()),
            RandomTokenGenerator::default(),
            config,
        )
        .with_password_hasher(hasher);
        let state = AppState::new(server, Key::generate());
        let router = gateway_routes(state, CSRF_KEY).unwrap();

        Self { router, store }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// A browser: remembers cookies and the last CSRF token it was shown.
#[derive(Default)]
pub struct Browser {
    pub cookies: Vec<(String, String)>,
    pub csrf_token: Option<String>,
}

impl Browser {
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) {
        self.cookies.retain(|(n, _)| n != name);
        self.cookies.push((name.to_owned(), value.to_owned()));
    }

    /// Applies `Set-Cookie` headers, dropping cookies that were cleared.
    pub fn absorb(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            let value = value.to_str().unwrap();
            let pair = value.split(';').next().unwrap();
            let (name, cookie_value) = pair.split_once('=').unwrap();
            self.cookies.retain(|(n, _)| n != name);
            let cleared = cookie_value.is_empty() || value.contains("Max-Age=0");
            if !cleared {
                self.cookies.push((name.to_owned(), cookie_value.to_owned()));
            }
        }
    }

    pub fn request(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookies) = self.cookie_header() {
            builder = builder.header(COOKIE, cookies);
        }
        builder
    }

    /// Sends a request, then takes in its cookies and any page token.
    pub async fn send(&mut self, app: &TestApp, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
        let response = app.send(request).await;
        let status = response.status();
        let headers = response.headers().clone();
        self.absorb(&headers);
        let body = body_string(response.into_body()).await;
        if let Some(token) = page_csrf_token(&body) {
            self.csrf_token = Some(token);
        }
        (status, headers, body)
    }

    /// Loads the login page to pick up a CSRF cookie and token.
    pub async fn visit_login(&mut self, app: &TestApp) {
        let request = self.request("GET", "/oauth/login").body(Body::empty()).unwrap();
        let (status, _, _) = self.send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(self.csrf_token.is_some());
    }

    pub async fn login(&mut self, app: &TestApp, user_id: &str, password: &str) -> StatusCode {
        let body = serde_json::json!({ "user_id": user_id, "password": password }).to_string();
        let request = self
            .request("POST", "/oauth/api/auth/login")
            .header("content-type", "application/json")
            .header("x-csrf-token", self.csrf_token.clone().unwrap())
            .body(Body::from(body))
            .unwrap();
        self.send(app, request).await.0
    }

    /// Visits the login page and logs in as alice.
    pub async fn logged_in(app: &TestApp) -> Self {
        let mut browser = Self::default();
        browser.visit_login(app).await;
        assert_eq!(
            browser.login(app, "alice", "wonderland").await,
            StatusCode::NO_CONTENT
        );
        assert!(browser.cookie("_session").is_some());
        browser
    }
}

pub async fn body_string(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_to_json(body: Body) -> serde_json::Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// The token in `<meta name="csrf-token" content="...">`.
pub fn page_csrf_token(page: &str) -> Option<String> {
    let marker = r#"<meta name="csrf-token" content=""#;
    let start = page.find(marker)? + marker.len();
    let end = page[start..].find('"')? + start;
    Some(page[start..end].to_owned())
}

pub fn basic_auth(client_id: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{client_id}:{secret}")))
}

pub fn location(headers: &HeaderMap) -> String {
    headers
        .get("location")
        .expect("location header")
        .to_str()
        .unwrap()
        .to_owned()
}

pub fn query_param(url: &str, name: &str) -> Option<String> {
    url::Url::parse(url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// POSTs a form to /oauth/token.
pub async fn token_request(
    app: &TestApp,
    basic: Option<(&str, &str)>,
    params: &[(&str, &str)],
) -> (StatusCode, HeaderMap, serde_json::Value) {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    let mut builder = Request::builder()
        .method("POST")
        .uri("/oauth/token")
        .header("content-type", "application/x-www-form-urlencoded");
    if let Some((id, secret)) = basic {
        builder = builder.header("authorization", basic_auth(id, secret));
    }
    let response = app.send(builder.body(Body::from(body)).unwrap()).await;
    let status = response.status();
    let headers = response.headers().clone();
    (status, headers, body_to_json(response.into_body()).await)
}
