//! Failures of the storage layer, before they are mapped to HTTP responses.

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Result type alias for storage operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// What part of accepting an upload failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Storage settings were rejected at startup.
    Config,
    /// The storage directory could not be created.
    DirectoryCreation,
    /// An uploaded file could not be written or moved into place.
    FileWrite,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::DirectoryCreation => "directory_creation",
            Self::FileWrite => "file_write",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage error, carrying the path involved and the I/O failure behind it.
#[derive(Debug, thiserror::Error)]
pub struct Error {
    kind: ErrorKind,
    reason: Cow<'static, str>,
    path: Option<PathBuf>,
    #[source]
    source: Option<io::Error>,
}

impl Error {
    /// Rejects storage settings for the given reason.
    pub fn config(reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind: ErrorKind::Config,
            reason: reason.into(),
            path: None,
            source: None,
        }
    }

    /// The storage directory at `path` could not be created.
    pub fn directory_creation(path: &Path) -> Self {
        Self::at(ErrorKind::DirectoryCreation, "cannot create storage directory", path)
    }

    /// The upload at `path` could not be written.
    pub fn file_write(path: &Path) -> Self {
        Self::at(ErrorKind::FileWrite, "cannot write uploaded file", path)
    }

    fn at(kind: ErrorKind, reason: &'static str, path: &Path) -> Self {
        Self {
            kind,
            reason: Cow::Borrowed(reason),
            path: Some(path.to_path_buf()),
            source: None,
        }
    }

    /// Records the I/O failure that caused this error.
    pub fn with_source(mut self, source: io::Error) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason without the path.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.reason
    }

    /// Returns the file or directory the failure concerns.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.reason)?;
        if let Some(path) = &self.path {
            write!(f, " '{}'", path.display())?;
        }
        Ok(())
    }
}
