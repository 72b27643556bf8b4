//! # Dispatcher Module
//!
//! Turns a [`CanonicalRequest`](crate::server::CanonicalRequest) into a
//! [`Response`](crate::server::Response).
//!
//! ## Request Flow
//!
//! 1. Router selects the single registration for the request's resource and method
//! 2. Raw path parameters are coerced against the registration's declarations
//! 3. The handler runs with an [`Invocation`]: the request, the coerced
//!    parameters and the ambient response it may mutate
//! 4. Any error from steps 1-3 is converted into the response by one of two
//!    tiers: classified errors keep their status, everything else is a 500
//! 5. User middleware run in registration order, in their own failure scope
//! 6. The content transformer encodes the body for the wire
//!
//! ## Error Handling
//!
//! - Lookup failures return 404 / 405 / 406
//! - Coercion failures return 404
//! - Handler panics are caught and return 500 responses
//! - With debug enabled, 500 bodies carry the error message and a trace
//!
//! ## Example
//!
//! ```rust
//! use gwrouter::dispatcher::Dispatcher;
//! use gwrouter::router::Router;
//! use gwrouter::server::{Body, CanonicalRequest};
//! use http::Method;
//! use serde_json::json;
//!
//! let mut router = Router::new();
//! router.get("/ping", |_| Ok(json!({"pong": true}))).unwrap();
//! let dispatcher = Dispatcher::new(router);
//!
//! let res = dispatcher.dispatch(CanonicalRequest::new(Method::GET, "/ping").with_resource("/ping"));
//! assert_eq!(res.status, 200);
//! assert_eq!(res.body, Body::Encoded("{\"pong\":true}".to_string()));
//! ```

mod core;

pub use core::{handler_fn, Dispatcher, FnHandler, Handler, Invocation, Reply};
