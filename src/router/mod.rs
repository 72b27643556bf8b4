//! # Router Module
//!
//! Path matching and route resolution.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Compiling route templates (e.g. `/articles/{year}/{month}/`) into anchored regexes
//! - Keeping the route table: registrations bucketed by template string
//! - Resolving a raw path to its template for event sources that only forward the path
//! - Selecting the single registration that serves a request, or explaining why none does
//!
//! ## Architecture
//!
//! The router uses a two-phase approach:
//!
//! 1. **Registration**: each template is compiled once by [`CompiledPattern::compile`];
//!    class-based parameter types are cached in the router's
//!    [`FieldRegistry`](crate::fields::FieldRegistry).
//!
//! 2. **Lookup**: requests that already carry their template are looked up by exact key
//!    ([`Router::find_route`]); requests that only carry a path go through
//!    [`Router::resolve_path`] first, which tests patterns in registration order.
//!
//! ## Example
//!
//! ```rust
//! use gwrouter::router::Router;
//! use serde_json::json;
//!
//! let mut router = Router::new();
//! router.get("/pets/{id}", |inv| Ok(json!({ "id": inv.params.str("id") }))).unwrap();
//!
//! let (template, params) = router.resolve_path("/pets/123");
//! assert_eq!(template, Some("/pets/{id}"));
//! assert_eq!(params[0].1, "123");
//! ```

mod core;
mod pattern;

pub use core::{MethodVec, ParamVec, RouteEntry, RouteSpec, Router, MAX_INLINE_PARAMS};
pub use pattern::{CompiledPattern, PatternError, Segment};
