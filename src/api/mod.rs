//! axum integration: handlers, extractors and the gateway router.

mod error;
mod handlers;
mod middleware;
mod render;
mod routes;
mod types;

use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum::response::{IntoResponse, Response};

pub use error::AppError;
pub use middleware::{AuthenticatedUser, Secure, extract_bearer_token};
pub use render::render_page;
pub use routes::{AppState, gateway_routes};
pub use types::*;

/// `302 Found`; axum's `Redirect` only offers 303, 307 and 308.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location)]).into_response()
}
