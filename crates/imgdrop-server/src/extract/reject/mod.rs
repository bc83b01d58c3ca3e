//! Enhanced request extractors with improved error handling.
//!
//! These extractors are designed to be drop-in replacements for their
//! standard Axum counterparts while providing detailed error context.

pub mod enhanced_multipart;

pub use self::enhanced_multipart::Multipart;
