use serde::{Deserialize, Serialize};

use crate::service::StoredFile;

/// Key under which the editor widget expects the image source.
pub const IMAGE_SRC_KEY: &str = "SUNEDITOR_IMAGE_SRC";

/// One stored image as reported to the editor.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    /// Public path of the stored file.
    #[serde(rename = "SUNEDITOR_IMAGE_SRC")]
    pub src_path: String,
}

impl From<&StoredFile> for UploadedImage {
    fn from(stored: &StoredFile) -> Self {
        Self {
            src_path: stored.src_path().to_owned(),
        }
    }
}

/// Stored images of a single upload request.
pub type UploadedImages = Vec<UploadedImage>;
