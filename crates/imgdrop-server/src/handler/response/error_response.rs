use std::borrow::Cow;

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// JSON body of a failed request.
///
/// The message is serialized as `errorMessage`, the key the editor's upload
/// callback inspects to report a failed upload.
#[must_use = "error responses do nothing unless serialized"]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub name: Cow<'static, str>,
    #[serde(rename = "errorMessage")]
    pub message: Cow<'static, str>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Cow<'static, str>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Cow<'static, str>>,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
