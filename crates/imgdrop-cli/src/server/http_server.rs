use std::future::IntoFuture;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::config::ServerConfig;
use crate::server::{Drain, ServerError, ServerResult};
use crate::{TRACING_TARGET_SERVER_SHUTDOWN, TRACING_TARGET_SERVER_STARTUP};

/// Serves plain HTTP until the drain after a shutdown signal ends.
pub async fn serve_http(app: Router, config: &ServerConfig, drain: Drain) -> ServerResult<()> {
    let addr = config.server_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        addr = %addr,
        "accepting uploads over HTTP"
    );

    let timeout = config.shutdown_timeout();
    let signalled = Arc::new(Notify::new());
    let on_signal = Arc::clone(&signalled);
    let watched = drain.clone();

    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        drain.until_signalled(timeout).await;
        on_signal.notify_one();
    });

    // Axum waits for open connections without a limit.
    let deadline = async {
        signalled.notified().await;
        tokio::time::sleep(timeout).await;
    };

    tokio::select! {
        result = server.into_future() => result.map_err(ServerError::Serve),
        () = deadline => {
            tracing::warn!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                abandoned = watched.in_flight(),
                timeout_secs = timeout.as_secs(),
                "shutdown timeout elapsed, dropping unfinished uploads"
            );
            Ok(())
        }
    }
}
