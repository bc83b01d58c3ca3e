//! HTTP request extractors with improved error handling.
//!
//! Extractors here are drop-in replacements for their standard Axum
//! counterparts whose rejections render as the crate's structured error
//! responses instead of plain-text bodies.
//!
//! - [`Multipart`] - `multipart/form-data` streaming with structured rejections

pub mod reject;

pub use crate::extract::reject::Multipart;
