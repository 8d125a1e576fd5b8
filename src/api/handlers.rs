//! HTTP handlers for the gateway endpoints.

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, OriginalUri, Query, State};
use axum::http::header::{AUTHORIZATION, CACHE_CONTROL, PRAGMA};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use serde_json::json;

use super::error::AppError;
use super::found;
use super::middleware::{AuthenticatedUser, Secure, extract_bearer_token};
use super::render::render_page;
use super::routes::AppState;
use super::types::{LoginRequest, UserResponse};
use crate::SecretString;
use crate::csrf::CsrfToken;
use crate::oauth::{AuthorizeRequest, ClientCredentials, OAuthError, TokenRequest};
use crate::repository::CredentialStore;
use crate::session::removal_cookie;
use crate::token::TokenGenerator;

#[derive(Debug, Deserialize)]
pub struct LoginPageQuery {
    /// Where to send the browser after logging in.
    pub n: Option<String>,
}

/// Paths on this host only; rejects scheme-relative and backslash tricks.
fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

/// Render the login page, or skip it when already logged in.
///
/// GET /login
pub async fn login_page<S, G>(
    State(state): State<AppState<S, G>>,
    user: Option<AuthenticatedUser>,
    csrf: CsrfToken,
    Query(query): Query<LoginPageQuery>,
) -> Response
where
    S: CredentialStore + 'static,
    G: TokenGenerator + 'static,
{
    let next = query.n.filter(|n| is_local_path(n));

    if let (Some(_), Some(next)) = (&user, &next) {
        return found(next);
    }

    let config = state.server.config();
    render_page(
        &config.ui,
        &config.mount_path(),
        csrf.as_str(),
        "login",
        json!({ "next": next, "logged_in": user.is_some() }),
    )
    .into_response()
}

/// Check the password and open a browser session.
///
/// POST /api/auth/login
pub async fn login<S, G>(
    State(state): State<AppState<S, G>>,
    Secure(secure): Secure,
    jar: PrivateCookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(PrivateCookieJar, StatusCode), AppError>
where
    S: CredentialStore + 'static,
    G: TokenGenerator + 'static,
{
    let password = SecretString::new(body.password);
    let outcome = state.server.login(&body.user_id, &password).await?;

    let cookie = outcome
        .cookie
        .to_cookie(&state.server.config().session, secure);
    Ok((jar.add(cookie), StatusCode::NO_CONTENT))
}

/// End the browser session. Always succeeds.
///
/// POST /api/auth/logout
pub async fn logout<S, G>(
    State(state): State<AppState<S, G>>,
    headers: HeaderMap,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, StatusCode), AppError>
where
    S: CredentialStore + 'static,
    G: TokenGenerator + 'static,
{
    let bearer = extract_bearer_token(&headers);
    state.server.logout(bearer.as_deref()).await?;

    let removal = removal_cookie(&state.server.config().session);
    Ok((jar.remove(removal), StatusCode::NO_CONTENT))
}

/// GET /api/me
pub async fn me(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(UserResponse::from(user.into_inner().user))
}

/// The authorization endpoint.
///
/// ANY /authorize
pub async fn authorize<S, G>(
    State(state): State<AppState<S, G>>,
    user: Option<AuthenticatedUser>,
    csrf: CsrfToken,
    OriginalUri(original): OriginalUri,
    method: Method,
    body: Bytes,
) -> Response
where
    S: CredentialStore + 'static,
    G: TokenGenerator + 'static,
{
    let config = state.server.config();
    let mount = config.mount_path();
    let original_path = original
        .path_and_query()
        .map_or_else(|| original.path().to_owned(), |pq| pq.as_str().to_owned());

    // only a browser session may approve; access tokens cannot
    let Some(user) = user.filter(|u| u.0.session_id().is_some()) else {
        let location = format!(
            "{mount}/login?n={}",
            urlencoding::encode(&original_path)
        );
        return found(&location);
    };

    let form = (method == Method::POST).then_some(&body[..]);
    let request = AuthorizeRequest::from_query_and_form(original.query(), form);

    let validated = match state.server.validate_authorize(&request).await {
        Ok(validated) => validated,
        Err(rejection) => return rejection.into_response(),
    };
    let user_id = user.user().id.as_str();

    let approve = match method {
        Method::GET | Method::HEAD if validated.client.skip_authorization => true,
        Method::GET | Method::HEAD => {
            let data = json!({
                "client": { "id": validated.client.id, "name": validated.client.name },
                "scope": validated.scope,
                "redirect_uri": validated.redirect_uri,
                "state": validated.state,
                "action": original_path,
                "user": { "user_id": user_id, "name": user.user().name },
            });
            return render_page(&config.ui, &mount, csrf.as_str(), "consent", data)
                .into_response();
        }
        Method::POST => request.authorize,
        _ => return StatusCode::METHOD_NOT_ALLOWED.into_response(),
    };

    if approve {
        match state.server.approve(&validated, user_id).await {
            Ok(location) => found(&location),
            Err(e) => e.into_response(),
        }
    } else {
        found(&state.server.deny(&validated, user_id).await)
    }
}

/// The token endpoint. Form-encoded, authenticated by client credentials.
///
/// POST /token
pub async fn token<S, G>(
    State(state): State<AppState<S, G>>,
    headers: HeaderMap,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Response
where
    S: CredentialStore + 'static,
    G: TokenGenerator + 'static,
{
    let no_store = [(CACHE_CONTROL, "no-store"), (PRAGMA, "no-cache")];

    let request = match form {
        Ok(Form(request)) => request,
        Err(rejection) => {
            log::debug!(
                target: "portcullis::oauth",
                "msg=\"token request body rejected\" error=\"{rejection}\""
            );
            let err = OAuthError::invalid_request(
                "body must be application/x-www-form-urlencoded",
            );
            return (no_store, err).into_response();
        }
    };

    let basic = match headers.get(AUTHORIZATION).map(|v| v.to_str()) {
        None => None,
        Some(Ok(value)) if value.get(..6).is_some_and(|s| s.eq_ignore_ascii_case("basic ")) => {
            match ClientCredentials::from_basic(value) {
                Some(credentials) => Some(credentials),
                None => return (no_store, OAuthError::invalid_client()).into_response(),
            }
        }
        // other schemes are not client authentication
        Some(_) => None,
    };

    match state.server.token(request, basic).await {
        Ok(response) => (no_store, Json(response)).into_response(),
        Err(e) => (no_store, e).into_response(),
    }
}

/// Page shell for every other path the frontend routes itself.
///
/// GET / and GET /*
pub async fn fallback<S, G>(
    State(state): State<AppState<S, G>>,
    csrf: CsrfToken,
    OriginalUri(original): OriginalUri,
) -> Html<String>
where
    S: CredentialStore + 'static,
    G: TokenGenerator + 'static,
{
    let config = state.server.config();
    render_page(
        &config.ui,
        &config.mount_path(),
        csrf.as_str(),
        "app",
        json!({ "path": original.path() }),
    )
}
