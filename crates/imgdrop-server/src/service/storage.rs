//! Local filesystem storage for uploaded editor images.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempPath;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::{Error, Result};

/// Tracing target for storage operations.
const TRACING_TARGET: &str = "imgdrop_server::service::storage";

/// Store that writes uploaded files under a base directory and maps them
/// to public source paths.
///
/// Every stored file gets a freshly generated identifier, so concurrent
/// requests can share the same directory without coordination.
#[derive(Debug, Clone)]
pub struct UploadStore {
    base_dir: Arc<Path>,
    public_base_path: Arc<str>,
}

impl UploadStore {
    /// Creates a new store.
    ///
    /// The directory does not need to exist yet, it is created by
    /// [`ensure_base_dir`](UploadStore::ensure_base_dir).
    pub fn new(base_dir: impl Into<PathBuf>, public_base_path: impl Into<String>) -> Self {
        let base_dir: PathBuf = base_dir.into();
        let public_base_path: String = public_base_path.into();

        Self {
            base_dir: Arc::from(base_dir),
            public_base_path: Arc::from(public_base_path),
        }
    }

    /// Returns the base directory path.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the prefix prepended to stored file names in responses.
    pub fn public_base_path(&self) -> &str {
        &self.public_base_path
    }

    /// Creates the base directory and all missing parents.
    ///
    /// An already existing directory is not an error.
    pub async fn ensure_base_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir).await.map_err(|err| {
            tracing::error!(
                target: TRACING_TARGET,
                error = %err,
                path = %self.base_dir.display(),
                "failed to create storage directory"
            );
            Error::directory_creation(&self.base_dir).with_source(err)
        })
    }

    /// Opens a staging file for an upload named `original_filename`.
    ///
    /// Content is written to a hidden `.part` file in the base directory
    /// and only appears under its final name once
    /// [`finish`](StoredFileWriter::finish) succeeds. Dropping the writer
    /// at any earlier point, including a cancelled request, removes the
    /// staging file.
    pub async fn create(&self, original_filename: &str) -> Result<StoredFileWriter> {
        let extension = file_extension(original_filename);
        let identifier = generate_identifier();
        let file_name = format!("{identifier}{extension}");
        let staging_path = self.base_dir.join(format!(".{identifier}.part"));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&staging_path)
            .await
            .map_err(|err| {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %err,
                    path = %staging_path.display(),
                    "failed to create staging file"
                );
                Error::file_write(&staging_path).with_source(err)
            })?;

        tracing::trace!(
            target: TRACING_TARGET,
            original_filename,
            staging_path = %staging_path.display(),
            "staging file created"
        );

        Ok(StoredFileWriter {
            file,
            staging: TempPath::from_path(staging_path),
            stored: StoredFile {
                src_path: format!("{}{}", self.public_base_path, file_name),
                path: self.base_dir.join(&file_name),
                identifier,
                extension: extension.to_owned(),
                size: 0,
            },
        })
    }

    /// Stores a complete buffer as a new file.
    pub async fn store(&self, original_filename: &str, bytes: &[u8]) -> Result<StoredFile> {
        let mut writer = self.create(original_filename).await?;
        writer.write(bytes).await?;
        writer.finish().await
    }
}

/// Upload in progress.
///
/// The staging file is deleted when the writer is dropped without being
/// finished.
#[derive(Debug)]
#[must_use = "dropping a writer discards the upload"]
pub struct StoredFileWriter {
    file: File,
    staging: TempPath,
    stored: StoredFile,
}

impl StoredFileWriter {
    /// Appends a chunk of the uploaded content.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.file.write_all(chunk).await.map_err(|err| {
            tracing::error!(
                target: TRACING_TARGET,
                error = %err,
                path = %self.staging.display(),
                "failed to write uploaded content"
            );
            Error::file_write(&self.staging).with_source(err)
        })?;

        self.stored.size += chunk.len() as u64;
        Ok(())
    }

    /// Returns the number of bytes written so far.
    pub fn written(&self) -> u64 {
        self.stored.size
    }

    /// Flushes the content and moves it to its final name.
    ///
    /// Fails without replacing anything if a file with the final name
    /// already exists.
    pub async fn finish(self) -> Result<StoredFile> {
        let Self {
            mut file,
            staging,
            stored,
        } = self;

        if let Err(err) = file.flush().await {
            tracing::error!(
                target: TRACING_TARGET,
                error = %err,
                path = %staging.display(),
                "failed to flush uploaded content"
            );
            return Err(Error::file_write(&staging).with_source(err));
        }
        drop(file);

        let destination = stored.path.clone();
        let persisted =
            tokio::task::spawn_blocking(move || staging.persist_noclobber(&destination)).await;

        let err = match persisted {
            Ok(Ok(())) => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    path = %stored.path.display(),
                    size = stored.size,
                    "uploaded file stored"
                );
                return Ok(stored);
            }
            // The staging file is removed when the returned path drops.
            Ok(Err(err)) => io::Error::from(err),
            Err(err) => io::Error::other(err),
        };

        tracing::error!(
            target: TRACING_TARGET,
            error = %err,
            path = %stored.path.display(),
            "failed to move upload to its final name"
        );
        Err(Error::file_write(&stored.path).with_source(err))
    }
}

/// Descriptor of a file persisted by the [`UploadStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    identifier: String,
    extension: String,
    path: PathBuf,
    src_path: String,
    size: u64,
}

impl StoredFile {
    /// Generated identifier, 32 lowercase hex characters.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Extension copied from the original filename, including the dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Stored file name: identifier followed by the extension.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.identifier, self.extension)
    }

    /// Destination path on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Public path returned to the client.
    pub fn src_path(&self) -> &str {
        &self.src_path
    }

    /// Number of bytes written.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Returns the extension of `filename`: everything from the last `.` of its
/// final path component, or an empty string when there is none.
///
/// The extension is kept verbatim, case included.
pub fn file_extension(filename: &str) -> &str {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    name.rfind('.').map_or("", |index| &name[index..])
}

/// Generates a random 32 character hex identifier.
pub fn generate_identifier() -> String {
    Uuid::new_v4().simple().to_string()
}
