//! Request ids and tracing spans.
//!
//! Each request carries an `x-request-id`, generated when the editor sends
//! none, which is echoed back and recorded on the request span together with
//! the declared upload size.

use axum::Router;
use axum::body::Body;
use axum::http::header::{self, HeaderName};
use axum::http::{HeaderMap, Request};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Extension trait for `axum::`[`Router`] to apply observability middleware.
pub trait RouterObservabilityExt<S> {
    /// Assigns request ids and opens a `request` span per request.
    fn with_observability(self) -> Self;
}

impl<S> RouterObservabilityExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_observability(self) -> Self {
        let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

        self.layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(SetSensitiveRequestHeadersLayer::new([
                header::AUTHORIZATION,
                header::COOKIE,
            ]))
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }
}

fn request_span(request: &Request<Body>) -> Span {
    let headers = request.headers();

    tracing::info_span!(
        "request",
        method = %request.method(),
        path = request.uri().path(),
        request_id = header_str(headers, REQUEST_ID_HEADER),
        content_length = header_str(headers, header::CONTENT_LENGTH.as_str()),
    )
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use axum::routing::get;
    use axum_test::TestServer;

    use super::*;

    fn create_server() -> anyhow::Result<TestServer> {
        let router: Router = Router::new()
            .route("/", get(|| async { "ok" }))
            .with_observability();
        Ok(TestServer::new(router)?)
    }

    #[tokio::test]
    async fn generates_request_id() -> anyhow::Result<()> {
        let server = create_server()?;

        let response = server.get("/").await;
        assert!(!response.header(REQUEST_ID_HEADER).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn propagates_editor_request_id() -> anyhow::Result<()> {
        let server = create_server()?;

        let response = server
            .get("/")
            .add_header(REQUEST_ID_HEADER, "editor-42")
            .await;
        assert_eq!(response.header(REQUEST_ID_HEADER), "editor-42");
        Ok(())
    }

    #[test]
    fn reads_declared_upload_size() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, "2048".parse().unwrap());

        assert_eq!(header_str(&headers, "content-length"), Some("2048"));
        assert_eq!(header_str(&headers, REQUEST_ID_HEADER), None);
    }
}
