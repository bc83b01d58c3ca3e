//! Draining in-flight uploads on SIGINT or SIGTERM.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use imgdrop_server::handler::ErrorKind;

use crate::TRACING_TARGET_SERVER_SHUTDOWN;

/// Counts requests in flight and refuses new ones once shutdown starts.
///
/// Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct Drain {
    state: Arc<DrainState>,
}

#[derive(Debug, Default)]
struct DrainState {
    in_flight: AtomicUsize,
    draining: AtomicBool,
}

impl Drain {
    /// Layers request tracking over `app`.
    pub fn track(&self, app: Router) -> Router {
        app.layer(middleware::from_fn_with_state(self.clone(), track_request))
    }

    /// Returns the number of requests currently being handled.
    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::Acquire)
    }

    pub fn is_draining(&self) -> bool {
        self.state.draining.load(Ordering::Acquire)
    }

    /// Refuses further requests and returns how many are still running.
    pub fn start(&self) -> usize {
        self.state.draining.store(true, Ordering::Release);
        self.in_flight()
    }

    /// Waits for SIGINT or SIGTERM, then starts draining.
    ///
    /// Uploads still running get `timeout` to finish, the caller enforces it.
    pub async fn until_signalled(self, timeout: Duration) {
        wait_for_signal().await;

        let in_flight = self.start();
        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            in_flight,
            timeout_secs = timeout.as_secs(),
            "draining in-flight uploads"
        );
    }
}

/// Decrements the in-flight count when the request completes or is dropped.
struct InFlight(Arc<DrainState>);

impl InFlight {
    fn enter(state: &Arc<DrainState>) -> Self {
        state.in_flight.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(state))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

async fn track_request(State(drain): State<Drain>, request: Request, next: Next) -> Response {
    if drain.is_draining() {
        tracing::debug!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            uri = %request.uri(),
            "request refused while draining"
        );
        return ErrorKind::StorageUnavailable
            .with_message("The server is shutting down, retry the upload shortly")
            .into_response();
    }

    let _in_flight = InFlight::enter(&drain.state);
    next.run(request).await
}

async fn wait_for_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                error = %err,
                "cannot listen for Ctrl+C"
            );
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET_SERVER_SHUTDOWN,
                    error = %err,
                    "cannot listen for SIGTERM"
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        () = interrupt => "SIGINT",
        () = terminate => "SIGTERM",
    };

    tracing::info!(
        target: TRACING_TARGET_SERVER_SHUTDOWN,
        signal,
        "shutdown requested"
    );
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum_test::TestServer;

    use super::*;

    fn create_router(drain: &Drain) -> Router {
        let observed = drain.clone();
        let router = Router::new().route(
            "/",
            get(move || async move { observed.in_flight().to_string() }),
        );
        drain.track(router)
    }

    #[tokio::test]
    async fn counts_running_requests() -> anyhow::Result<()> {
        let drain = Drain::default();
        let server = TestServer::new(create_router(&drain))?;

        let response = server.get("/").await;
        response.assert_status_ok();
        response.assert_text("1");
        assert_eq!(drain.in_flight(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn refuses_requests_while_draining() -> anyhow::Result<()> {
        let drain = Drain::default();
        let server = TestServer::new(create_router(&drain))?;

        assert_eq!(drain.start(), 0);
        assert!(drain.is_draining());

        let response = server.get("/").expect_failure().await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

        let body: serde_json::Value = response.json();
        assert!(body["errorMessage"].as_str().is_some_and(|m| m.contains("shutting down")));
        assert_eq!(drain.in_flight(), 0);
        Ok(())
    }
}
