//! Upload storage and the state handlers extract it from.

mod config;
mod storage;

pub use crate::service::config::{
    DEFAULT_PUBLIC_PATH, DEFAULT_STORAGE_DIR, DEFAULT_UPLOAD_ROUTE, ServiceConfig,
};
pub use crate::service::storage::{
    StoredFile, StoredFileWriter, UploadStore, file_extension, generate_identifier,
};
pub use crate::{Error, Result};

/// Shared by every request. Handlers take the [`UploadStore`] out of it
/// through [`FromRef`].
///
/// [`FromRef`]: axum::extract::FromRef
#[must_use = "state does nothing unless you use it"]
#[derive(Debug, Clone)]
pub struct ServiceState {
    service_config: ServiceConfig,
    upload_store: UploadStore,
}

impl ServiceState {
    /// Validates `config` and resolves the storage directory, which the
    /// first upload creates.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            upload_store: config.create_upload_store()?,
            service_config: config.clone(),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.service_config
    }

    pub fn upload_store(&self) -> &UploadStore {
        &self.upload_store
    }
}

impl axum::extract::FromRef<ServiceState> for UploadStore {
    fn from_ref(state: &ServiceState) -> Self {
        state.upload_store.clone()
    }
}
