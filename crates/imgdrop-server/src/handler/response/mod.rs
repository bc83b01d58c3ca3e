//! Response types for HTTP handlers.

mod error_response;
mod uploads;

pub use error_response::ErrorResponse;
pub use uploads::{IMAGE_SRC_KEY, UploadedImage, UploadedImages};
