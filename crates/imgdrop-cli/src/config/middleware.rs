//! Settings for the layers wrapped around the upload routes.
//!
//! ```bash
//! # Let an editor on another origin upload up to 10 MiB per request
//! imgdrop --cors-origins "https://cms.example.com" --max-body-size 10485760
//! ```

use clap::Args;
use imgdrop_server::middleware::{BodyLimitConfig, CorsConfig, RecoveryConfig};
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Browser origins allowed to post uploads.
    #[clap(flatten)]
    pub cors: CorsConfig,

    /// Per-request upload timeout.
    #[clap(flatten)]
    pub recovery: RecoveryConfig,

    /// Cap on the multipart body size.
    #[clap(flatten)]
    pub body_limit: BodyLimitConfig,
}

impl MiddlewareConfig {
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            cors_origins = ?self.cors.origins,
            cors_credentials = self.cors.allow_credentials,
            upload_timeout_secs = self.recovery.request_timeout,
            max_body_size = ?self.body_limit.max_body_size,
            "request limits"
        );
    }
}
