//! Multipart extractor that rejects malformed uploads with JSON errors.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{FromRequest, Multipart as AxumMultipart, Request};
use axum::http::StatusCode;
use derive_more::{Deref, DerefMut, From};

use crate::handler::{Error, ErrorKind};

/// Tracing target for multipart extraction.
const TRACING_TARGET: &str = "imgdrop_server::extract::multipart";

/// [`axum::extract::Multipart`] whose rejections carry the editor's
/// `errorMessage` body instead of plain text.
#[must_use]
#[derive(Debug, Deref, DerefMut, From)]
pub struct Multipart(pub AxumMultipart);

impl<S> FromRequest<S> for Multipart
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        AxumMultipart::from_request(req, state)
            .await
            .map(Multipart)
            .map_err(Into::into)
    }
}

impl From<MultipartRejection> for Error {
    fn from(rejection: MultipartRejection) -> Self {
        tracing::debug!(
            target: TRACING_TARGET,
            rejection = %rejection,
            "multipart request rejected"
        );

        let (message, context) = match rejection {
            MultipartRejection::InvalidBoundary(_) => (
                "Invalid multipart boundary",
                "Images must be sent as multipart/form-data with a boundary",
            ),
            _ => (
                "Expected a multipart upload",
                "The upload body is not a multipart form",
            ),
        };

        ErrorKind::BadRequest
            .with_message(message)
            .with_context(context)
    }
}

impl From<MultipartError> for Error {
    fn from(error: MultipartError) -> Self {
        tracing::warn!(
            target: TRACING_TARGET,
            error = %error,
            status = %error.status(),
            "failed to read multipart field"
        );

        if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ErrorKind::PayloadTooLarge
                .with_message("Upload exceeds the body size limit")
                .with_context(error.body_text());
        }

        // Also reached when the client aborts mid-part.
        ErrorKind::BadRequest
            .with_message("Malformed multipart upload")
            .with_context(error.body_text())
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::header;

    use super::*;

    #[tokio::test]
    async fn rejects_missing_boundary() -> anyhow::Result<()> {
        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "multipart/form-data")
            .body(Body::empty())?;

        let error = Multipart::from_request(request, &()).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::BadRequest);
        assert_eq!(error.message(), "Invalid multipart boundary");
        Ok(())
    }

    #[tokio::test]
    async fn rejects_non_multipart_content_type() -> anyhow::Result<()> {
        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))?;

        let error = Multipart::from_request(request, &()).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::BadRequest);
        assert_eq!(error.context(), Some("The upload body is not a multipart form"));
        Ok(())
    }
}
