//! Service error to HTTP error conversion implementation.
//!
//! Storage failures are logged with their filesystem paths and mapped to
//! distinct status codes. Paths never reach the response body.

use super::http_error::{Error as HttpError, ErrorKind};
use crate::ErrorKind as ServiceErrorKind;

/// Tracing target for service error conversions.
const TRACING_TARGET: &str = "imgdrop_server::handler::service";

impl From<crate::Error> for HttpError {
    fn from(error: crate::Error) -> Self {
        tracing::error!(
            target: TRACING_TARGET,
            error = %error,
            error_kind = %error.kind(),
            "service operation failed"
        );

        match error.kind() {
            ServiceErrorKind::DirectoryCreation => ErrorKind::StorageUnavailable
                .with_message("Upload directory is unavailable")
                .with_resource("storage"),

            ServiceErrorKind::FileWrite => ErrorKind::InternalServerError
                .with_message("Failed to store uploaded file")
                .with_resource("file"),

            ServiceErrorKind::Config => ErrorKind::InternalServerError
                .with_message("Invalid server configuration"),
        }
    }
}
