use std::path::Path;

use axum::Router;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;

use crate::TRACING_TARGET_SERVER_STARTUP;
use crate::config::ServerConfig;
use crate::server::{Drain, ServerError, ServerResult};

/// Serves HTTPS with the given PEM files until the drain after a shutdown
/// signal ends.
///
/// Connections still open when the shutdown timeout elapses are closed.
pub async fn serve_https(
    app: Router,
    config: &ServerConfig,
    drain: Drain,
    cert_path: &Path,
    key_path: &Path,
) -> ServerResult<()> {
    ensure_pem_file(cert_path, "certificate")?;
    ensure_pem_file(key_path, "private key")?;

    let tls = RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|err| ServerError::Tls(err.to_string()))?;

    let addr = config.server_addr();
    let timeout = config.shutdown_timeout();
    let handle = Handle::new();

    let shutdown = handle.clone();
    tokio::spawn(async move {
        drain.until_signalled(timeout).await;
        shutdown.graceful_shutdown(Some(timeout));
    });

    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        addr = %addr,
        cert_path = %cert_path.display(),
        "accepting uploads over HTTPS"
    );

    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .map_err(|source| match source.kind() {
            std::io::ErrorKind::AddrInUse
            | std::io::ErrorKind::AddrNotAvailable
            | std::io::ErrorKind::PermissionDenied => ServerError::Bind { addr, source },
            _ => ServerError::Serve(source),
        })
}

/// Rejects a missing, unreadable or empty PEM file before rustls parses it.
fn ensure_pem_file(path: &Path, what: &str) -> ServerResult<()> {
    let metadata = std::fs::metadata(path)
        .map_err(|err| ServerError::Tls(format!("{what} '{}': {err}", path.display())))?;

    if !metadata.is_file() || metadata.len() == 0 {
        return Err(ServerError::Tls(format!(
            "{what} '{}' is not a non-empty file",
            path.display()
        )));
    }

    Ok(())
}
