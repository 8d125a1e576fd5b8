use std::sync::Arc;

use axum::Router;
use axum::extract::FromRef;
use axum::routing::{any, get, post};
use axum_extra::extract::cookie::Key;
use tower::ServiceBuilder;

use super::handlers;
use crate::AuthError;
use crate::csrf::{CsrfLayer, skip_if_bearer_authenticated};
use crate::oauth::AuthorizationServer;
use crate::repository::CredentialStore;
use crate::session::SessionBridgeLayer;
use crate::token::{RandomTokenGenerator, TokenGenerator};

pub struct AppState<S, G = RandomTokenGenerator> {
    pub server: Arc<AuthorizationServer<S, G>>,
    /// Encrypts the session cookie.
    pub cookie_key: Key,
}

impl<S, G> AppState<S, G> {
    pub fn new(server: AuthorizationServer<S, G>, cookie_key: Key) -> Self {
        Self {
            server: Arc::new(server),
            cookie_key,
        }
    }
}

// derive(Clone) would require S: Clone and G: Clone
impl<S, G> Clone for AppState<S, G> {
    fn clone(&self) -> Self {
        Self {
            server: Arc::clone(&self.server),
            cookie_key: self.cookie_key.clone(),
        }
    }
}

impl<S, G> FromRef<AppState<S, G>> for Key {
    fn from_ref(state: &AppState<S, G>) -> Self {
        state.cookie_key.clone()
    }
}

/// Builds the complete gateway, mounted under `config.mount`.
///
/// Browser-facing routes sit behind the CSRF guard and, inside it, the
/// session bridge, so the guard sees whether the caller sent its own bearer
/// credential before the cookie is turned into one. `/token` is called by
/// OAuth clients, not browsers, and gets neither.
///
/// # Errors
///
/// Returns `AuthError::ConfigurationError` for an invalid configuration or a
/// CSRF key shorter than 32 bytes.
pub fn gateway_routes<S, G>(state: AppState<S, G>, csrf_key: &[u8]) -> Result<Router, AuthError>
where
    S: CredentialStore + 'static,
    G: TokenGenerator + 'static,
{
    let config = state.server.config();
    config.validate()?;

    let csrf = CsrfLayer::new(csrf_key, config.csrf.clone())?
        .skip_check(skip_if_bearer_authenticated)
        .trust_forwarded_proto(config.trust_forwarded_proto);
    let bridge = SessionBridgeLayer::new(
        state.cookie_key.clone(),
        config.session.cookie_name.clone(),
    );

    let browser = Router::new()
        .route("/login", get(handlers::login_page::<S, G>))
        .route("/api/auth/login", post(handlers::login::<S, G>))
        .route("/api/auth/logout", post(handlers::logout::<S, G>))
        .route("/api/me", get(handlers::me))
        .route("/authorize", any(handlers::authorize::<S, G>))
        .route("/", get(handlers::fallback::<S, G>))
        .route("/{*path}", get(handlers::fallback::<S, G>))
        .layer(ServiceBuilder::new().layer(csrf).layer(bridge));

    let clients = Router::new().route("/token", post(handlers::token::<S, G>));

    let mount = config.mount_path();
    let routes = browser.merge(clients).with_state(state);

    log::info!(
        target: "portcullis",
        "msg=\"gateway routes built\" mount=\"{mount}\""
    );

    if mount.is_empty() {
        Ok(routes)
    } else {
        Ok(Router::new().nest(&mount, routes))
    }
}
