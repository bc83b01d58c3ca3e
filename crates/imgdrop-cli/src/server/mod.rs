//! Serving the upload router over HTTP, or HTTPS with the `tls` feature.
//!
//! HTTPS is used when both certificate paths are configured. Either way the
//! server drains in-flight uploads for at most the shutdown timeout once
//! SIGINT or SIGTERM arrives.

mod error;
mod http_server;
#[cfg(feature = "tls")]
mod https_server;
mod shutdown;

use std::time::Instant;

use axum::Router;
pub use error::{ServerError, ServerResult};
pub use shutdown::Drain;

use crate::config::ServerConfig;
use crate::{TRACING_TARGET_SERVER_SHUTDOWN, TRACING_TARGET_SERVER_STARTUP};

/// Serves `app` until a shutdown signal and the following drain complete.
pub async fn serve(app: Router, config: ServerConfig) -> ServerResult<()> {
    if let Err(err) = config.validate() {
        return report(Err(ServerError::InvalidConfig(format!("{err:#}"))), None);
    }

    if config.is_public() {
        tracing::warn!(
            target: TRACING_TARGET_SERVER_STARTUP,
            addr = %config.server_addr(),
            "accepting uploads on all interfaces"
        );
    }

    let drain = Drain::default();
    let app = drain.track(app);
    let started = Instant::now();

    #[cfg(feature = "tls")]
    if let Some((cert_path, key_path)) = config.tls_paths() {
        let result = https_server::serve_https(app, &config, drain, cert_path, key_path).await;
        return report(result, Some(started));
    }

    let result = http_server::serve_http(app, &config, drain).await;
    report(result, Some(started))
}

/// Logs how the server ended, with a hint for operators on failure.
fn report(result: ServerResult<()>, started: Option<Instant>) -> ServerResult<()> {
    let uptime_secs = started.map(|started| started.elapsed().as_secs());

    match &result {
        Ok(()) => tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            uptime_secs,
            "upload server stopped"
        ),
        Err(err) => tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = %err,
            hint = err.hint(),
            uptime_secs,
            "upload server failed"
        ),
    }

    result
}
