//! Request/response model and the outward entry point.

pub mod request;
pub mod response;
pub mod service;

pub use request::{url_decode, CanonicalEventAdapter, CanonicalRequest, Context, EventAdapter};
pub use response::{
    Body, HeaderVec, Response, TransportResponse, DEFAULT_CONTENT_TYPE, MAX_INLINE_HEADERS,
};
pub use service::AppService;
