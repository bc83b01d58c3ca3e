//! Command line and environment settings.
//!
//! ```text
//! Cli
//! ├── server: ServerConfig         # listener, TLS, shutdown drain
//! ├── middleware: MiddlewareConfig # CORS, upload timeout, body limit
//! └── service: ServiceConfig       # storage directory, public path, route
//! ```
//!
//! Every flag has an environment variable fallback, see `imgdrop --help`:
//!
//! ```bash
//! imgdrop --storage-dir /srv/images --port 8080
//! UPLOAD_STORAGE_DIR=/srv/images PORT=8080 imgdrop
//! ```

mod middleware;
mod server;

use anyhow::Context;
use clap::Parser;
use imgdrop_server::service::ServiceConfig;
pub use middleware::MiddlewareConfig;
use serde::{Deserialize, Serialize};
pub use server::ServerConfig;

use crate::TRACING_TARGET_CONFIG;

/// Compile-time features this binary was built with.
const FEATURES: &[(&str, bool)] = &[
    ("tls", cfg!(feature = "tls")),
    ("dotenv", cfg!(feature = "dotenv")),
];

#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "imgdrop", version)]
#[command(about = "Accepts image uploads from rich-text editors and stores them on disk")]
pub struct Cli {
    #[clap(flatten)]
    pub server: ServerConfig,

    #[clap(flatten)]
    pub middleware: MiddlewareConfig,

    #[clap(flatten)]
    pub service: ServiceConfig,
}

impl Cli {
    /// Parses arguments, reading `.env` first so it can supply the
    /// environment fallbacks.
    pub fn init() -> Self {
        #[cfg(feature = "dotenv")]
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            // Tracing is not set up yet.
            eprintln!("warning: ignoring unreadable .env file: {err}");
        }

        Self::parse()
    }

    /// Checks the listener and storage settings.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server.validate().context("invalid listener settings")?;
        self.service.validate().context("invalid upload settings")?;
        Ok(())
    }

    pub fn log(&self) {
        let features: Vec<_> = FEATURES
            .iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(name, _)| *name)
            .collect();

        tracing::debug!(
            target: TRACING_TARGET_CONFIG,
            pid = std::process::id(),
            features = ?features,
            "build"
        );

        self.server.log();
        self.middleware.log();

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            storage_dir = %self.service.storage_dir.display(),
            public_path = %self.service.public_path,
            upload_route = %self.service.upload_route,
            serve_uploads = self.service.serve_uploads,
            "upload storage"
        );
    }
}
