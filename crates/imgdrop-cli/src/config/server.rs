//! Listener settings of the upload server.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
#[cfg(feature = "tls")]
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::ensure;
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// Longest drain the server accepts for in-flight uploads on shutdown.
const MAX_SHUTDOWN_TIMEOUT: u64 = 300;

/// Where the upload server listens and how long it drains on shutdown.
///
/// ```bash
/// imgdrop --host 0.0.0.0 --port 8080
/// HOST=0.0.0.0 PORT=8080 imgdrop
/// ```
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
#[must_use = "config does nothing unless you use it"]
pub struct ServerConfig {
    /// Address to listen on, `0.0.0.0` to accept uploads from any interface.
    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,

    /// Port to listen on, 1024 or above.
    #[arg(short = 'p', long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Seconds in-flight uploads may take to finish once shutdown starts.
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 30)]
    pub shutdown_timeout: u64,

    /// PEM certificate chain, serves HTTPS together with `--tls-key-path`.
    #[cfg(feature = "tls")]
    #[arg(long, env = "TLS_CERT_PATH", requires = "tls_key_path")]
    pub tls_cert_path: Option<PathBuf>,

    /// PEM private key matching `--tls-cert-path`.
    #[cfg(feature = "tls")]
    #[arg(long, env = "TLS_KEY_PATH", requires = "tls_cert_path")]
    pub tls_key_path: Option<PathBuf>,
}

impl ServerConfig {
    /// Checks the port and the shutdown drain.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.port >= 1024,
            "port {} needs elevated privileges, use 1024 or above",
            self.port
        );
        ensure!(
            (1..=MAX_SHUTDOWN_TIMEOUT).contains(&self.shutdown_timeout),
            "shutdown timeout must be between 1 and {MAX_SHUTDOWN_TIMEOUT} seconds, got {}",
            self.shutdown_timeout
        );

        #[cfg(feature = "tls")]
        ensure!(
            self.tls_cert_path.is_some() == self.tls_key_path.is_some(),
            "TLS certificate and key paths must be set together"
        );

        Ok(())
    }

    pub const fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }

    /// Returns whether uploads are accepted on every interface.
    pub const fn is_public(&self) -> bool {
        self.host.is_unspecified()
    }

    /// Returns the certificate and key paths when HTTPS is configured.
    #[cfg(feature = "tls")]
    pub fn tls_paths(&self) -> Option<(&Path, &Path)> {
        self.tls_cert_path
            .as_deref()
            .zip(self.tls_key_path.as_deref())
    }

    fn scheme(&self) -> &'static str {
        #[cfg(feature = "tls")]
        if self.tls_paths().is_some() {
            return "https";
        }

        "http"
    }

    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            addr = %self.server_addr(),
            scheme = self.scheme(),
            shutdown_timeout_secs = self.shutdown_timeout,
            "listener configuration"
        );
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            shutdown_timeout: 30,
            #[cfg(feature = "tls")]
            tls_cert_path: None,
            #[cfg(feature = "tls")]
            tls_key_path: None,
        }
    }
}
