//! Editor image upload handler.
//!
//! Accepts the `multipart/form-data` submission of the editor's image dialog,
//! stores every non-empty file part under the configured directory with a
//! generated name, and answers with the public path of each stored file.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::multipart::Field;
use axum::routing::{Router, post};

use crate::extract::Multipart;
use crate::handler::Result;
use crate::handler::response::{UploadedImage, UploadedImages};
use crate::service::{ServiceConfig, ServiceState, StoredFile, StoredFileWriter, UploadStore};

/// Tracing target for upload operations.
const TRACING_TARGET: &str = "imgdrop_server::handler::uploads";

/// Uploads editor images.
///
/// Form data: any number of file parts under any field names. Text fields
/// and empty files are ignored.
#[tracing::instrument(skip_all)]
async fn upload_images(
    State(upload_store): State<UploadStore>,
    Multipart(mut multipart): Multipart,
) -> Result<Json<UploadedImages>> {
    upload_store.ensure_base_dir().await?;

    tracing::debug!(
        target: TRACING_TARGET,
        base_dir = %upload_store.base_dir().display(),
        "starting image upload"
    );

    let mut batch = UploadBatch::default();

    while let Some(mut field) = multipart.next_field().await? {
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            tracing::debug!(target: TRACING_TARGET, "skipping field without filename");
            continue;
        };

        let field_name = field.name().unwrap_or_default().to_owned();

        let Some(first_chunk) = next_non_empty_chunk(&mut field).await? else {
            tracing::debug!(
                target: TRACING_TARGET,
                field_name = %field_name,
                file_name = %file_name,
                "skipping empty file"
            );
            continue;
        };

        // Files stored by earlier parts are kept if this one fails.
        let mut writer = upload_store.create(&file_name).await?;
        copy_field(&mut field, &mut writer, first_chunk).await?;
        let stored = writer.finish().await?;

        tracing::debug!(
            target: TRACING_TARGET,
            field_name = %field_name,
            file_name = %file_name,
            stored_as = %stored.file_name(),
            size = stored.size(),
            "image stored"
        );

        batch.push(field_name, &stored);
    }

    let images = batch.into_images();

    tracing::info!(
        target: TRACING_TARGET,
        file_count = images.len(),
        "image upload completed"
    );

    Ok(Json(images))
}

/// Returns a [`Router`] with the upload route from `config`.
pub fn routes(config: &ServiceConfig) -> Router<ServiceState> {
    Router::new().route(&config.upload_route, post(upload_images))
}

/// Reads chunks until a non-empty one arrives, `None` at the end of the field.
async fn next_non_empty_chunk(field: &mut Field<'_>) -> Result<Option<Bytes>> {
    while let Some(chunk) = field.chunk().await? {
        if !chunk.is_empty() {
            return Ok(Some(chunk));
        }
    }

    Ok(None)
}

/// Streams the remainder of `field` into `writer`.
async fn copy_field(
    field: &mut Field<'_>,
    writer: &mut StoredFileWriter,
    first_chunk: Bytes,
) -> Result<()> {
    writer.write(&first_chunk).await?;
    while let Some(chunk) = field.chunk().await? {
        writer.write(&chunk).await?;
    }

    Ok(())
}

/// Stored images grouped by field name.
///
/// Fields keep the order of their first appearance and files keep their
/// order within a field, so interleaved parts are reported field by field.
#[derive(Debug, Default)]
struct UploadBatch {
    fields: Vec<(String, Vec<UploadedImage>)>,
}

impl UploadBatch {
    fn push(&mut self, field_name: String, stored: &StoredFile) {
        let image = UploadedImage::from(stored);
        match self.fields.iter_mut().find(|(name, _)| *name == field_name) {
            Some((_, images)) => images.push(image),
            None => self.fields.push((field_name, vec![image])),
        }
    }

    fn into_images(self) -> UploadedImages {
        self.fields
            .into_iter()
            .flat_map(|(_, images)| images)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::Path;

    use axum::http::StatusCode;
    use axum_test::TestServer;
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::Value;
    use tempfile::TempDir;

    use axum::body::{Body, Bytes};
    use axum::http::{Request, header};
    use futures::stream::{self, StreamExt};
    use tower::ServiceExt;

    use crate::handler::response::{IMAGE_SRC_KEY, UploadedImage};
    use crate::handler::routes;
    use crate::handler::test::create_test_server_with_config;
    use crate::middleware::{RecoveryConfig, RouterRecoveryExt};
    use crate::service::{ServiceConfig, ServiceState};

    const UPLOAD_ROUTE: &str = "/editor/uploadImage.ajax";

    fn test_config(storage_dir: &Path) -> ServiceConfig {
        ServiceConfig {
            storage_dir: storage_dir.to_path_buf(),
            ..ServiceConfig::default()
        }
    }

    async fn test_server(storage_dir: &Path) -> anyhow::Result<TestServer> {
        create_test_server_with_config(&test_config(storage_dir)).await
    }

    fn file_part(bytes: &[u8], file_name: &str) -> Part {
        Part::bytes(bytes.to_vec()).file_name(file_name)
    }

    fn stored_name(image: &UploadedImage) -> &str {
        image
            .src_path
            .strip_prefix("/download/editorImg/")
            .expect("source path carries the public prefix")
    }

    #[tokio::test]
    async fn skips_empty_file() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let server = test_server(temp.path()).await?;

        let form = MultipartForm::new()
            .add_part("file-0", file_part(b"", "empty.png"))
            .add_part("file-1", file_part(b"\xff\xd8\xff\xe0jpeg", "cat.jpg"));

        let response = server.post(UPLOAD_ROUTE).multipart(form).await;
        response.assert_status_ok();

        let images: Vec<UploadedImage> = response.json();
        assert_eq!(images.len(), 1);
        assert!(images[0].src_path.ends_with(".jpg"));

        let stored = temp.path().join(stored_name(&images[0]));
        assert_eq!(std::fs::read(stored)?, b"\xff\xd8\xff\xe0jpeg");
        assert_eq!(std::fs::read_dir(temp.path())?.count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn response_uses_editor_key() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let server = test_server(temp.path()).await?;

        let form = MultipartForm::new().add_part("file-0", file_part(b"png", "a.png"));
        let response = server.post(UPLOAD_ROUTE).multipart(form).await;

        let body: Value = response.json();
        let items = body.as_array().expect("response is a JSON array");
        assert_eq!(items.len(), 1);

        let item = items[0].as_object().expect("items are objects");
        assert_eq!(item.len(), 1);
        let src = item[IMAGE_SRC_KEY].as_str().expect("source path is a string");
        assert!(src.starts_with("/download/editorImg/"));
        Ok(())
    }

    #[tokio::test]
    async fn keeps_extensions_verbatim() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let server = test_server(temp.path()).await?;

        let form = MultipartForm::new()
            .add_part("file", file_part(b"1", "my.photo.final.png"))
            .add_part("file", file_part(b"2", "photo"))
            .add_part("file", file_part(b"3", "Scan.JPEG"));

        let images: Vec<UploadedImage> = server.post(UPLOAD_ROUTE).multipart(form).await.json();
        assert_eq!(images.len(), 3);

        let names: Vec<&str> = images.iter().map(stored_name).collect();
        assert!(names[0].ends_with(".png"));
        assert_eq!(names[0].len(), 32 + ".png".len());
        assert_eq!(names[1].len(), 32);
        assert!(!names[1].contains('.'));
        assert!(names[2].ends_with(".JPEG"));
        Ok(())
    }

    #[tokio::test]
    async fn identifiers_are_unique_within_request() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let server = test_server(temp.path()).await?;

        let mut form = MultipartForm::new();
        for index in 0..16 {
            form = form.add_part("file", file_part(b"same bytes", &format!("img{index}.gif")));
        }

        let images: Vec<UploadedImage> = server.post(UPLOAD_ROUTE).multipart(form).await.json();
        let unique: HashSet<&str> = images.iter().map(stored_name).collect();
        assert_eq!(images.len(), 16);
        assert_eq!(unique.len(), 16);
        Ok(())
    }

    #[tokio::test]
    async fn creates_missing_directory() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let storage_dir = temp.path().join("public").join("download").join("editorImg");
        let server = test_server(&storage_dir).await?;
        assert!(!storage_dir.exists());

        let form = MultipartForm::new().add_part("file-0", file_part(b"gif89a", "cat.gif"));
        let images: Vec<UploadedImage> = server.post(UPLOAD_ROUTE).multipart(form).await.json();

        assert!(storage_dir.is_dir());
        assert!(storage_dir.join(stored_name(&images[0])).is_file());
        Ok(())
    }

    #[tokio::test]
    async fn groups_files_by_field_order() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let server = test_server(temp.path()).await?;

        let form = MultipartForm::new()
            .add_part("a", file_part(b"a1", "a1.png"))
            .add_part("b", file_part(b"b1", "b1.jpg"))
            .add_part("a", file_part(b"a2", "a2.gif"));

        let images: Vec<UploadedImage> = server.post(UPLOAD_ROUTE).multipart(form).await.json();
        let contents: Vec<Vec<u8>> = images
            .iter()
            .map(|image| std::fs::read(temp.path().join(stored_name(image))))
            .collect::<Result<_, _>>()?;

        assert_eq!(contents, [b"a1".to_vec(), b"a2".to_vec(), b"b1".to_vec()]);
        Ok(())
    }

    #[tokio::test]
    async fn ignores_text_fields() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let server = test_server(temp.path()).await?;

        let form = MultipartForm::new()
            .add_text("alt", "a cat")
            .add_part("file-0", file_part(b"img", "cat.webp"));

        let images: Vec<UploadedImage> = server.post(UPLOAD_ROUTE).multipart(form).await.json();
        assert_eq!(images.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn no_files_yields_empty_array() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let server = test_server(temp.path()).await?;

        let form = MultipartForm::new().add_part("file-0", file_part(b"", "empty.png"));
        let response = server.post(UPLOAD_ROUTE).multipart(form).await;

        response.assert_status_ok();
        response.assert_json(&serde_json::json!([]));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_non_multipart_body() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let server = test_server(temp.path()).await?;

        let response = server
            .post(UPLOAD_ROUTE)
            .json(&serde_json::json!({ "file": "cat.jpg" }))
            .expect_failure()
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["name"], "bad_request");
        assert!(body["errorMessage"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn reports_unavailable_storage() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, b"not a directory")?;
        let server = test_server(&blocker.join("editorImg")).await?;

        let form = MultipartForm::new().add_part("file-0", file_part(b"img", "cat.jpg"));
        let response = server
            .post(UPLOAD_ROUTE)
            .multipart(form)
            .expect_failure()
            .await;

        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = response.json();
        assert_eq!(body["name"], "storage_unavailable");
        assert!(body["errorMessage"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn stored_files_are_served() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let server = test_server(temp.path()).await?;

        let form = MultipartForm::new().add_part("file-0", file_part(b"<svg/>", "logo.svg"));
        let images: Vec<UploadedImage> = server.post(UPLOAD_ROUTE).multipart(form).await.json();

        let response = server.get(&images[0].src_path).await;
        response.assert_status_ok();
        assert_eq!(response.as_bytes().as_ref(), b"<svg/>");
        Ok(())
    }

    #[tokio::test]
    async fn failed_part_keeps_earlier_files() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let server = test_server(temp.path()).await?;

        // The stored name of the second part exceeds the filesystem limit.
        let overlong = format!("cat.{}", "x".repeat(300));
        let form = MultipartForm::new()
            .add_part("file-0", file_part(b"first", "first.png"))
            .add_part("file-1", file_part(b"second", &overlong))
            .add_part("file-2", file_part(b"third", "third.png"));

        let response = server
            .post(UPLOAD_ROUTE)
            .multipart(form)
            .expect_failure()
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["name"], "internal_server_error");
        assert!(body["errorMessage"].is_string());

        let entries: Vec<_> = std::fs::read_dir(temp.path())?.collect::<Result<_, _>>()?;
        assert_eq!(entries.len(), 1);
        let kept = entries[0].file_name().to_string_lossy().into_owned();
        assert!(kept.ends_with(".png"));
        assert_eq!(kept.len(), 32 + ".png".len());
        assert_eq!(std::fs::read(entries[0].path())?, b"first");
        Ok(())
    }

    #[tokio::test]
    async fn timed_out_upload_leaves_no_partial_file() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let state = ServiceState::from_config(&test_config(temp.path()))?;
        let app = routes(&state)
            .with_state(state)
            .with_recovery(&RecoveryConfig::with_timeout_secs(1));

        // Sends the start of a file part, then stalls until the timeout.
        let head = "--boundary\r\n\
                    Content-Disposition: form-data; name=\"file-0\"; filename=\"cat.jpg\"\r\n\
                    Content-Type: image/jpeg\r\n\r\n\
                    HALFWRITTEN";
        let body = stream::once(async move { Ok::<_, std::io::Error>(Bytes::from(head)) })
            .chain(stream::pending());

        let request = Request::post(UPLOAD_ROUTE)
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=boundary")
            .body(Body::from_stream(body))?;

        let response = app.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(std::fs::read_dir(temp.path())?.count(), 0);
        Ok(())
    }
}
