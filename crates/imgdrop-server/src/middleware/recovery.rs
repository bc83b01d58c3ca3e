//! Turns stalled and panicking uploads into JSON errors.
//!
//! A request that exceeds the timeout is cancelled. Dropping the upload
//! handler discards the file being written, files finished earlier in the
//! same request stay on disk.

use std::any::Any;
use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::response::{IntoResponse, Response};
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use tower::timeout::TimeoutLayer;
use tower::timeout::error::Elapsed;
use tower::{BoxError, ServiceBuilder};
use tower_http::catch_panic::CatchPanicLayer;

use crate::handler::{Error, ErrorKind};

/// Tracing target for cancelled and failed requests.
const TRACING_TARGET: &str = "imgdrop_server::middleware::recovery";

/// Request timeout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct RecoveryConfig {
    /// Seconds a single upload request may take before it is cancelled.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "REQUEST_TIMEOUT", default_value = "30")
    )]
    pub request_timeout: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self::with_timeout_secs(30)
    }
}

impl RecoveryConfig {
    pub fn with_timeout_secs(request_timeout: u64) -> Self {
        Self { request_timeout }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// Extension trait for `axum::`[`Router`] to apply recovery middleware.
pub trait RouterRecoveryExt<S> {
    /// Cancels requests exceeding the timeout and answers panics with a
    /// 500 JSON error instead of closing the connection.
    fn with_recovery(self, config: &RecoveryConfig) -> Self;
}

impl<S> RouterRecoveryExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_recovery(self, config: &RecoveryConfig) -> Self {
        let timeout = config.request_timeout();
        let layers = ServiceBuilder::new()
            .layer(HandleErrorLayer::new(move |err: BoxError| async move {
                recover_error(err, timeout)
            }))
            .layer(CatchPanicLayer::custom(recover_panic))
            .layer(TimeoutLayer::new(timeout));

        self.layer(layers)
    }
}

fn recover_error(err: BoxError, timeout: Duration) -> Response {
    if err.is::<Elapsed>() {
        tracing::warn!(
            target: TRACING_TARGET,
            timeout_secs = timeout.as_secs(),
            "upload cancelled after timeout"
        );

        return ErrorKind::InternalServerError
            .with_message("The upload took too long and was cancelled")
            .into_response();
    }

    tracing::error!(target: TRACING_TARGET, error = %err, "middleware failure");
    ErrorKind::InternalServerError.into_response()
}

fn recover_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    // A handler may panic with an `Error` to pick the response itself.
    if let Some(error) = payload.downcast_ref::<Error>() {
        tracing::error!(target: TRACING_TARGET, error = %error, "handler panicked");
        return error.clone().into_response();
    }

    let message = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");

    tracing::error!(target: TRACING_TARGET, panic = message, "handler panicked");
    ErrorKind::InternalServerError.into_response()
}
