//! All `axum::`[`Router`]s with related `axum::`[`Handler`]s.
//!
//! # Usage Example
//!
//! ```rust
//! use imgdrop_server::handler::routes;
//! use imgdrop_server::service::{ServiceConfig, ServiceState};
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = ServiceConfig::default();
//! let state = ServiceState::from_config(&config)?;
//!
//! let router: axum::Router = routes(&state).with_state(state);
//! # Ok(())
//! # }
//! ```
//!
//! [`Router`]: axum::routing::Router
//! [`Handler`]: axum::handler::Handler

mod error;
mod response;
mod uploads;

use axum::Router;
use axum::http::header::{self, HeaderValue};
use axum::response::{IntoResponse, Response};
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

pub use crate::handler::error::{Error, ErrorKind, Result};
pub use crate::handler::response::{ErrorResponse, IMAGE_SRC_KEY, UploadedImage, UploadedImages};
use crate::service::ServiceState;

/// Tracing target for route assembly.
const TRACING_TARGET: &str = "imgdrop_server::handler";

/// Policy for stored files: uploaded HTML or SVG never runs script on this
/// origin.
const STORED_FILE_POLICY: &str = "default-src 'none'; style-src 'unsafe-inline'; sandbox";

#[inline]
async fn handler() -> Response {
    ErrorKind::NotFound.into_response()
}

/// Returns a [`Router`] with all routes.
///
/// Stored files are served under the public path when enabled, and any
/// other request falls through to a `not_found` error.
pub fn routes(state: &ServiceState) -> Router<ServiceState> {
    let router = uploads::routes(state.config());

    let Some(route) = state.config().served_route() else {
        return router.fallback(handler);
    };

    let base_dir = state.upload_store().base_dir();
    tracing::debug!(
        target: TRACING_TARGET,
        route = %route,
        dir = %base_dir.display(),
        "serving stored uploads"
    );

    let serve_dir = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(STORED_FILE_POLICY),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .service(ServeDir::new(base_dir));
    // Nesting at the root is not supported.
    if route.is_empty() {
        router.fallback_service(serve_dir)
    } else {
        router.nest_service(route, serve_dir).fallback(handler)
    }
}
