//! # gwrouter
//!
//! **gwrouter** is the request-routing and dispatch core for short-lived
//! request/response handlers sitting behind an API gateway or load balancer.
//!
//! ## Overview
//!
//! An application registers handlers against route templates such as
//! `/articles/{year}/{month}/`, optionally declaring the type each path
//! parameter must be coerced into. Each incoming event is adapted into a
//! canonical request, matched to exactly one registration, its parameters
//! coerced, the handler invoked, and the result (or failure) normalised into
//! a transport response.
//!
//! ## Architecture
//!
//! - **[`router`]** - Template compilation and the route table
//! - **[`fields`]** - Typed path-parameter coercion with pluggable validators
//! - **[`dispatcher`]** - Handler invocation and error conversion
//! - **[`middleware`]** - Post-dispatch chain and the content transformer
//! - **[`server`]** - Canonical request/response model, event adapters, [`AppService`]
//! - **[`errors`]** - Error taxonomy
//! - **[`runtime_config`]** / **[`logging`]** - Debug flag and `tracing` setup
//!
//! ### Request Handling Flow
//!
//! ```text
//! raw event ─▶ EventAdapter ─▶ CanonicalRequest ─▶ Router::find_route
//!                                                      │
//!                         FieldRegistry::coerce ◀──────┘
//!                                  │
//!                               Handler ─▶ (error handlers) ─▶ middleware ─▶ content transformer
//!                                                                                   │
//!                                                               TransportResponse ◀─┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use gwrouter::fields::FieldType;
//! use gwrouter::router::{RouteSpec, Router};
//! use gwrouter::{AppService, Dispatcher};
//! use serde_json::json;
//!
//! let mut router = Router::new();
//! router
//!     .add(
//!         RouteSpec::get("/articles/{year}/{month}/", |inv| {
//!             Ok(json!({ "year": inv.params.int("year"), "month": inv.params.int("month") }))
//!         })
//!         .param("year", FieldType::integer())
//!         .param("month", FieldType::integer()),
//!     )
//!     .unwrap();
//!
//! let app = AppService::new(Dispatcher::new(router));
//! let event = json!({ "method": "GET", "path": "/articles/2020/10/" });
//! let res = app.handle(&event, ()).unwrap();
//! assert_eq!(res.status_code, 200);
//! assert_eq!(res.body, r#"{"month":10,"year":2020}"#);
//! ```
//!
//! ## Concurrency
//!
//! Registration happens during setup through `&mut Router`. Once the router
//! is moved into a [`Dispatcher`] it is immutable, so a dispatcher (or an
//! [`AppService`]) can be shared across threads and dispatch concurrently.
//! Each dispatch owns its own [`dispatcher::Invocation`].

pub mod dispatcher;
pub mod errors;
pub mod fields;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod runtime_config;
pub mod server;

pub use dispatcher::{Dispatcher, Handler, Invocation, Reply};
pub use errors::{ApplicationError, ConfigurationError, DispatchError, RouteError, ValidationError};
pub use router::{RouteSpec, Router};
pub use server::{AppService, CanonicalRequest, Response, TransportResponse};
