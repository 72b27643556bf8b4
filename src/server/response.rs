//! Response model.
//!
//! A [`Response`] is built up during one dispatch: handlers mutate it, the
//! error handlers overwrite it, middleware post-process it. Once the content
//! transformer has run, its body is [`Body::Encoded`] and it can be flattened
//! into a [`TransportResponse`] for the hosting layer.

use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;

/// Maximum number of headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Response headers in insertion order.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Content type every response starts with.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Response body before and after encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Structured value, not yet encoded for the wire.
    Value(Value),
    /// Wire representation produced by a content transformer.
    Encoded(String),
}

impl Default for Body {
    fn default() -> Self {
        Body::Value(Value::Null)
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Value(value)
    }
}

/// Per-invocation response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderVec,
    pub body: Body,
}

impl Default for Response {
    fn default() -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("Content-Type"), DEFAULT_CONTENT_TYPE.to_string()));
        Self {
            status: StatusCode::OK.as_u16(),
            headers,
            body: Body::default(),
        }
    }
}

impl Response {
    /// 200 with the default content type and an empty body.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Body::Value(body),
            ..Self::default()
        }
    }

    /// Builder form of [`Response::set_header`].
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header; names compare case-insensitively.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.get_header("content-type")
    }

    /// Set a structured body.
    pub fn set_body(&mut self, body: impl Into<Value>) {
        self.body = Body::Value(body.into());
    }

    /// The structured body, if it has not been encoded yet.
    #[must_use]
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Body::Value(v) => Some(v),
            Body::Encoded(_) => None,
        }
    }
}

/// Flattened response handed to the hosting layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportResponse {
    pub headers: HashMap<String, String>,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl From<Response> for TransportResponse {
    fn from(response: Response) -> Self {
        let body = match response.body {
            Body::Encoded(s) | Body::Value(Value::String(s)) => s,
            Body::Value(Value::Null) => String::new(),
            Body::Value(other) => other.to_string(),
        };
        Self {
            headers: response
                .headers
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            status_code: response.status,
            body,
        }
    }
}
