//! Browser-facing protection for the upload endpoint.
//!
//! The editor usually lives on another origin, so uploads need CORS. Every
//! response also gets headers that keep it from being framed or sniffed,
//! and the body limit decides how large a single upload request may be.

use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::http::header::{self, HeaderName, HeaderValue};
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

/// Tracing target for security middleware.
const TRACING_TARGET: &str = "imgdrop_server::middleware::security";

/// Header sent by editors that upload through `XMLHttpRequest`.
const X_REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");

/// Policy for responses that do not set their own, JSON bodies mostly.
const DEFAULT_CONTENT_SECURITY_POLICY: &str = "default-src 'none'; frame-ancestors 'none'";

/// Origins allowed when none are configured.
const DEVELOPMENT_ORIGINS: [&str; 5] = [
    "http://localhost:3000",
    "http://localhost:8080",
    "http://localhost:5173",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:8080",
];

/// Extension trait for `axum::`[`Router`] to apply security middleware.
pub trait RouterSecurityExt<S> {
    /// Layers CORS for the configured editor origins, protective response
    /// headers and response compression.
    fn with_security(self, cors: &CorsConfig) -> Self;

    /// Layers the request body limit used by multipart extraction.
    ///
    /// Without a configured maximum the limit is disabled entirely.
    fn with_body_limit(self, config: &BodyLimitConfig) -> Self;
}

impl<S> RouterSecurityExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_security(self, cors: &CorsConfig) -> Self {
        let origins = cors.allowed_origins();
        tracing::debug!(
            target: TRACING_TARGET,
            origins = ?origins,
            allow_credentials = cors.allow_credentials,
            "upload origins configured"
        );

        let cors_layer = CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT, X_REQUESTED_WITH])
            .allow_credentials(cors.allow_credentials)
            .max_age(cors.max_age());

        let headers = ServiceBuilder::new()
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("DENY"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::REFERRER_POLICY,
                HeaderValue::from_static("no-referrer"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::CONTENT_SECURITY_POLICY,
                HeaderValue::from_static(DEFAULT_CONTENT_SECURITY_POLICY),
            ));

        self.layer(CompressionLayer::new())
            .layer(cors_layer)
            .layer(headers)
    }

    fn with_body_limit(self, config: &BodyLimitConfig) -> Self {
        match config.max_body_size {
            Some(limit) => self.layer(DefaultBodyLimit::max(limit)),
            None => self.layer(DefaultBodyLimit::disable()),
        }
    }
}

/// Request body limit configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct BodyLimitConfig {
    /// Maximum request body size in bytes.
    ///
    /// Uploads exceeding it are rejected with 413. Unlimited when unset.
    #[cfg_attr(feature = "config", arg(long, env = "MAX_BODY_SIZE"))]
    pub max_body_size: Option<usize>,
}

impl BodyLimitConfig {
    /// Creates a configuration limiting bodies to `max_body_size` bytes.
    pub fn with_max_body_size(max_body_size: usize) -> Self {
        Self {
            max_body_size: Some(max_body_size),
        }
    }
}

/// Origins allowed to post uploads from a browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct CorsConfig {
    /// Origins of the pages embedding the editor.
    ///
    /// Local development origins are used when empty.
    #[cfg_attr(
        feature = "config",
        arg(long = "cors-origins", env = "CORS_ORIGINS", value_delimiter = ',')
    )]
    pub origins: Vec<String>,

    /// Seconds a browser may cache a preflight answer.
    #[cfg_attr(
        feature = "config",
        arg(long = "cors-max-age", env = "CORS_MAX_AGE", default_value = "3600")
    )]
    pub max_age_seconds: u64,

    /// Whether uploads may carry cookies of the editor's origin.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "cors-allow-credentials",
            env = "CORS_ALLOW_CREDENTIALS",
            default_value_t = true,
            action = clap::ArgAction::Set
        )
    )]
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: Vec::new(),
            max_age_seconds: 3600,
            allow_credentials: true,
        }
    }
}

impl CorsConfig {
    /// Returns the preflight cache duration.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_seconds)
    }

    /// Returns the allowed origins as header values.
    ///
    /// Configured origins that are not valid header values are skipped.
    pub fn allowed_origins(&self) -> Vec<HeaderValue> {
        if self.origins.is_empty() {
            return DEVELOPMENT_ORIGINS
                .into_iter()
                .map(HeaderValue::from_static)
                .collect();
        }

        self.origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        origin = %origin,
                        error = %err,
                        "invalid origin skipped"
                    );
                    None
                }
            })
            .collect()
    }
}
