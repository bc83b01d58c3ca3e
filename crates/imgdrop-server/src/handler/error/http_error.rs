//! Failure reported to the editor as a JSON error body.

use std::borrow::Cow;
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::handler::response::ErrorResponse;

/// A specialized [`Result`] type for upload handlers.
///
/// [`Result`]: std::result::Result
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Category of a failed request, fixing its status code and error name.
#[must_use = "error kinds do nothing unless turned into responses"]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or non-multipart upload.
    BadRequest,
    /// No route or stored file matches the request.
    NotFound,
    /// The body exceeds the configured limit.
    PayloadTooLarge,
    /// Failed write, timeout or panic.
    InternalServerError,
    /// The storage directory cannot be created.
    StorageUnavailable,
}

impl ErrorKind {
    /// Returns the HTTP status code of this kind.
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Returns the machine-readable name serialized as `name`.
    pub const fn name(self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::NotFound => "not_found",
            Self::PayloadTooLarge => "payload_too_large",
            Self::InternalServerError => "internal_server_error",
            Self::StorageUnavailable => "storage_unavailable",
        }
    }

    /// Returns the message used when no specific one is given.
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::BadRequest => "The upload is not valid multipart form data",
            Self::NotFound => "The requested resource was not found",
            Self::PayloadTooLarge => "The upload exceeds the maximum allowed size",
            Self::InternalServerError => "The upload failed, please try again later",
            Self::StorageUnavailable => "Uploaded images cannot be stored at the moment",
        }
    }

    /// Creates an [`Error`] of this kind with a specific message.
    pub fn with_message(self, message: impl Into<Cow<'static, str>>) -> Error {
        Error::new(self).with_message(message)
    }
}

impl IntoResponse for ErrorKind {
    fn into_response(self) -> Response {
        Error::new(self).into_response()
    }
}

/// Error returned by upload handlers and middleware.
#[derive(Debug, Clone)]
#[must_use = "errors do nothing unless turned into responses"]
pub struct Error {
    kind: ErrorKind,
    message: Option<Cow<'static, str>>,
    resource: Option<&'static str>,
    context: Option<Cow<'static, str>>,
}

impl Error {
    /// Creates a new [`Error`] with the kind's default message.
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            resource: None,
            context: None,
        }
    }

    /// Replaces the default message shown to the editor.
    pub fn with_message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Names what failed, `file` or `storage`.
    pub fn with_resource(mut self, resource: &'static str) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Adds detail for the client, never a filesystem path.
    pub fn with_context(mut self, context: impl Into<Cow<'static, str>>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message sent as `errorMessage`.
    pub fn message(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or(self.kind.default_message())
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.name(), self.message())?;
        if let Some(context) = &self.context {
            write!(f, " ({context})")?;
        }
        Ok(())
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.kind.status_code();
        let body = ErrorResponse {
            name: Cow::Borrowed(self.kind.name()),
            message: self
                .message
                .unwrap_or(Cow::Borrowed(self.kind.default_message())),
            resource: self.resource.map(Cow::Borrowed),
            context: self.context,
        };

        (status, body).into_response()
    }
}
