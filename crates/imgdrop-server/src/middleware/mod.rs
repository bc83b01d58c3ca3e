//! Middleware for `axum::Router` and HTTP request processing.
//!
//! Each concern is exposed as an extension trait on [`Router`]:
//!
//! - [`RouterRecoveryExt`] converts panics and timeouts into JSON errors.
//! - [`RouterObservabilityExt`] adds request IDs and tracing spans.
//! - [`RouterSecurityExt`] applies CORS, security headers and body limits.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use axum::Router;
//! use imgdrop_server::middleware::{
//!     BodyLimitConfig, CorsConfig, RecoveryConfig, RouterObservabilityExt,
//!     RouterRecoveryExt, RouterSecurityExt,
//! };
//!
//! let app: Router = Router::new()
//!     .with_body_limit(&BodyLimitConfig::default())
//!     .with_security(&CorsConfig::default())
//!     .with_observability()
//!     .with_recovery(&RecoveryConfig::default());
//! ```
//!
//! [`Router`]: axum::Router

mod observability;
mod recovery;
mod security;

pub use observability::RouterObservabilityExt;
pub use recovery::{RecoveryConfig, RouterRecoveryExt};
pub use security::{BodyLimitConfig, CorsConfig, RouterSecurityExt};
