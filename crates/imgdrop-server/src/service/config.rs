//! Where uploads are stored, how they are addressed, and which route
//! accepts them.

use std::path::PathBuf;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::service::UploadStore;
use crate::{Error, Result};

/// Default directory uploaded images are written to.
pub const DEFAULT_STORAGE_DIR: &str = "./public/download/editorImg";

/// Default prefix of the source paths returned to the editor.
pub const DEFAULT_PUBLIC_PATH: &str = "/download/editorImg/";

/// Default route of the upload endpoint.
pub const DEFAULT_UPLOAD_ROUTE: &str = "/editor/uploadImage.ajax";

/// App [`state`] configuration.
///
/// [`state`]: crate::service::ServiceState
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct ServiceConfig {
    /// Directory uploaded files are written to.
    ///
    /// Relative paths are resolved against the working directory of the
    /// server process. Missing directories are created on upload.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "UPLOAD_STORAGE_DIR", default_value = DEFAULT_STORAGE_DIR)
    )]
    pub storage_dir: PathBuf,

    /// Prefix prepended to stored file names in upload responses.
    ///
    /// Kept separate from the storage directory so the public URL
    /// namespace does not leak the disk layout. Must end with `/`.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "UPLOAD_PUBLIC_PATH", default_value = DEFAULT_PUBLIC_PATH)
    )]
    pub public_path: String,

    /// Route the upload endpoint is mounted at.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "UPLOAD_ROUTE", default_value = DEFAULT_UPLOAD_ROUTE)
    )]
    pub upload_route: String,

    /// Serves stored files under the public path.
    ///
    /// Only applies when the public path is root-relative.
    #[cfg_attr(
        feature = "config",
        arg(
            long,
            env = "SERVE_UPLOADS",
            default_value_t = true,
            action = clap::ArgAction::Set
        )
    )]
    pub serve_uploads: bool,
}

impl ServiceConfig {
    /// Validates all configuration values and returns errors for invalid settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The storage directory is empty
    /// - The public path does not end with `/`
    /// - The upload route does not start with `/`
    pub fn validate(&self) -> Result<()> {
        if self.storage_dir.as_os_str().is_empty() {
            return Err(Error::config("Storage directory cannot be empty"));
        }

        if !self.public_path.ends_with('/') {
            return Err(Error::config(format!(
                "Public path '{}' must end with '/'",
                self.public_path
            )));
        }

        if !self.upload_route.starts_with('/') {
            return Err(Error::config(format!(
                "Upload route '{}' must start with '/'",
                self.upload_route
            )));
        }

        Ok(())
    }

    /// Returns the storage directory as an absolute path.
    pub fn resolved_storage_dir(&self) -> Result<PathBuf> {
        std::path::absolute(&self.storage_dir).map_err(|err| {
            Error::config(format!(
                "Cannot resolve storage directory '{}'",
                self.storage_dir.display()
            ))
            .with_source(err)
        })
    }

    /// Returns the route stored files are served under, if any.
    ///
    /// This is the public path without its trailing slash, and `None` when
    /// serving is disabled or the public path is not root-relative.
    pub fn served_route(&self) -> Option<&str> {
        if !self.serve_uploads || !self.public_path.starts_with('/') {
            return None;
        }

        Some(self.public_path.trim_end_matches('/'))
    }

    /// Creates the upload store described by this configuration.
    pub fn create_upload_store(&self) -> Result<UploadStore> {
        let storage_dir = self.resolved_storage_dir()?;
        Ok(UploadStore::new(storage_dir, self.public_path.clone()))
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            storage_dir: DEFAULT_STORAGE_DIR.into(),
            public_path: DEFAULT_PUBLIC_PATH.to_owned(),
            upload_route: DEFAULT_UPLOAD_ROUTE.to_owned(),
            serve_uploads: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn validate_default_config() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn reject_public_path_without_trailing_slash() {
        let config = ServiceConfig {
            public_path: "/download/editorImg".to_owned(),
            ..ServiceConfig::default()
        };

        let error = config.validate().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Config);
    }

    #[test]
    fn reject_relative_upload_route() {
        let config = ServiceConfig {
            upload_route: "editor/uploadImage.ajax".to_owned(),
            ..ServiceConfig::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_empty_storage_dir() {
        let config = ServiceConfig {
            storage_dir: PathBuf::new(),
            ..ServiceConfig::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn resolved_storage_dir_is_absolute() -> anyhow::Result<()> {
        let config = ServiceConfig::default();
        assert!(config.resolved_storage_dir()?.is_absolute());
        Ok(())
    }

    #[test]
    fn served_route_strips_trailing_slash() {
        let config = ServiceConfig::default();
        assert_eq!(config.served_route(), Some("/download/editorImg"));
    }

    #[test]
    fn served_route_disabled() {
        let absolute = ServiceConfig {
            public_path: "https://cdn.example.com/img/".to_owned(),
            ..ServiceConfig::default()
        };
        assert_eq!(absolute.served_route(), None);

        let disabled = ServiceConfig {
            serve_uploads: false,
            ..ServiceConfig::default()
        };
        assert_eq!(disabled.served_route(), None);
    }

    #[test]
    #[cfg(feature = "config")]
    fn parse_from_cli_arguments() {
        use clap::Parser;

        #[derive(Parser)]
        struct TestCli {
            #[clap(flatten)]
            service: ServiceConfig,
        }

        let cli = TestCli::parse_from([
            "test",
            "--storage-dir",
            "/srv/images",
            "--public-path",
            "/images/",
            "--serve-uploads",
            "false",
        ]);

        assert_eq!(cli.service.storage_dir, PathBuf::from("/srv/images"));
        assert_eq!(cli.service.public_path, "/images/");
        assert_eq!(cli.service.upload_route, DEFAULT_UPLOAD_ROUTE);
        assert!(!cli.service.serve_uploads);
    }
}
