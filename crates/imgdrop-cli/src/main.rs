#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod server;

use std::process::ExitCode;

use anyhow::Context;
use axum::Router;
use imgdrop_server::handler::routes;
use imgdrop_server::middleware::{RouterObservabilityExt, RouterRecoveryExt, RouterSecurityExt};
use imgdrop_server::service::ServiceState;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{Cli, MiddlewareConfig};

pub const TRACING_TARGET_SERVER_STARTUP: &str = "imgdrop_cli::server::startup";
pub const TRACING_TARGET_SERVER_SHUTDOWN: &str = "imgdrop_cli::server::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "imgdrop_cli::config";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::init();
    init_tracing();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                error = format!("{error:#}"),
                "imgdrop exited with an error"
            );
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        "starting imgdrop"
    );

    cli.log();
    cli.validate()?;

    let state = ServiceState::from_config(&cli.service)
        .context("cannot prepare upload storage")?;
    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        storage_dir = %state.upload_store().base_dir().display(),
        "storing uploads"
    );

    let app = build_app(state, &cli.middleware);
    server::serve(app, cli.server).await?;
    Ok(())
}

/// The upload routes, wrapped from the inside out in the body limit, the
/// security headers, tracing and finally the timeout and panic recovery.
fn build_app(state: ServiceState, middleware: &MiddlewareConfig) -> Router {
    routes(&state)
        .with_state(state)
        .with_body_limit(&middleware.body_limit)
        .with_security(&middleware.cors)
        .with_observability()
        .with_recovery(&middleware.recovery)
}

/// Logs to stderr, filtered by `RUST_LOG` and `info` when unset.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
