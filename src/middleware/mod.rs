//! # Middleware Module
//!
//! Post-processing that runs after every dispatch, whether the handler
//! succeeded or not.
//!
//! - [`Middleware`]: the trait user middleware implement
//! - [`ContentTypeMiddleware`]: built-in, always last; encodes the body for
//!   the wire according to the response's `Content-Type`
//! - [`ApplicationErrorHandler`] / [`ExceptionHandler`]: the two tiers that
//!   turn errors into responses
//! - [`TracingMiddleware`]: per-request completion logging

mod content_type;
mod core;
mod error_handlers;
mod tracing;

pub use content_type::{ContentTransformer, ContentTypeMiddleware, JsonTransformer};
pub use core::Middleware;
pub use error_handlers::{ApplicationErrorHandler, ExceptionHandler, DEFAULT_500_MESSAGE};
pub use tracing::TracingMiddleware;
