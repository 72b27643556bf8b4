//! Canonical request model and event adapters.
//!
//! Upstream event sources each have their own JSON shape. An [`EventAdapter`]
//! turns one of those shapes into a [`CanonicalRequest`], which is the only
//! request type the router and dispatcher understand.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::Method;
use once_cell::sync::OnceCell;
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::{ApplicationError, ConfigurationError};
use crate::router::{ParamVec, Router};

/// Opaque per-invocation context handed through to handlers untouched.
pub type Context = Arc<dyn Any + Send + Sync>;

/// Request as seen by the routing core.
///
/// Header keys are lowercase. `path_params` holds raw strings; coercion
/// happens later against the matched route's declarations.
pub struct CanonicalRequest {
    pub method: Method,
    pub path: String,
    /// Template key used for bucket lookup. `None` when the event carried
    /// neither a resource nor a path that resolved to one.
    pub resource: Option<String>,
    pub headers: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    pub path_params: ParamVec,
    pub body: Option<String>,
    pub context: Option<Context>,
    json_body: OnceCell<Option<Value>>,
}

impl CanonicalRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            resource: None,
            headers: HashMap::new(),
            query_params: HashMap::new(),
            path_params: ParamVec::new(),
            body: None,
            context: None,
            json_body: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Add a header; the key is lowercased.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_path_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.path_params.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self.json_body = OnceCell::new();
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    /// Case-insensitive header lookup.
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| self.headers.get(&name.to_ascii_lowercase()))
            .map(String::as_str)
    }

    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    /// Whether the request declares a JSON body.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .is_some_and(|ct| ct.starts_with("application/json"))
    }

    /// The body parsed as JSON, parsed on first access and cached.
    ///
    /// Returns `Ok(None)` when the request is not JSON or has no body.
    /// A malformed JSON body is reported as a 400 [`ApplicationError`].
    pub fn json_body(&self) -> anyhow::Result<Option<&Value>> {
        let parsed = self.json_body.get_or_try_init(|| {
            if !self.is_json() {
                return Ok(None);
            }
            match self.body.as_deref() {
                None | Some("") => Ok(None),
                Some(raw) => serde_json::from_str(raw).map(Some).map_err(|e| {
                    ApplicationError::bad_request(format!("request body is not valid JSON: {e}"))
                }),
            }
        })?;
        Ok(parsed.as_ref())
    }

    /// Typed access to the opaque context.
    #[must_use]
    pub fn context<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.context.as_ref().and_then(|c| c.downcast_ref::<T>())
    }
}

impl fmt::Debug for CanonicalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanonicalRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("resource", &self.resource)
            .field("headers", &self.headers)
            .field("query_params", &self.query_params)
            .field("path_params", &self.path_params)
            .field("body_len", &self.body.as_ref().map(String::len))
            .field("has_context", &self.context.is_some())
            .finish()
    }
}

/// Translates one upstream event format into a [`CanonicalRequest`].
pub trait EventAdapter: Send + Sync {
    /// Whether this adapter understands `event`.
    fn matches(&self, event: &Value) -> bool;

    /// Build the canonical request.
    ///
    /// The router is available for event sources that only forward the raw
    /// path and need it resolved to a template.
    fn build(&self, event: &Value, router: &Router) -> Result<CanonicalRequest, ConfigurationError>;
}

/// Adapter for events already in the router's own JSON shape.
///
/// ```json
/// {
///   "method": "GET",
///   "resource": "/items/{id}",
///   "path": "/items/42",
///   "headers": {"Content-Type": "application/json"},
///   "query": {"page": "2"},
///   "path_params": {"id": "42"},
///   "body": null
/// }
/// ```
///
/// `resource` may be omitted when `path` is present; the template is then
/// resolved from the path and query values are URL-decoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct CanonicalEventAdapter;

impl EventAdapter for CanonicalEventAdapter {
    fn matches(&self, event: &Value) -> bool {
        event.get("method").is_some_and(Value::is_string)
    }

    fn build(&self, event: &Value, router: &Router) -> Result<CanonicalRequest, ConfigurationError> {
        let method_str = event
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| ConfigurationError::new("event carries no request method"))?;
        let method = Method::from_bytes(method_str.to_ascii_uppercase().as_bytes())
            .map_err(|_| ConfigurationError::new(format!("invalid request method '{method_str}'")))?;

        let path = event.get("path").and_then(Value::as_str);
        let resource = event.get("resource").and_then(Value::as_str);

        let mut request = match (resource, path) {
            (Some(resource), path) => {
                let mut request = CanonicalRequest::new(method, path.unwrap_or(resource));
                request.resource = Some(resource.to_string());
                request.path_params = string_pairs(event.get("path_params"))
                    .map(|(k, v)| (Arc::from(k.as_str()), v))
                    .collect();
                request.query_params = string_pairs(event.get("query")).collect();
                request
            }
            (None, Some(path)) => {
                let (template, path_params) = router.resolve_path(path);
                debug!(
                    path = %path,
                    resolved = ?template,
                    "Resolved resource from raw path"
                );
                let mut request = CanonicalRequest::new(method, path);
                request.resource = template.map(str::to_string);
                request.path_params = path_params;
                request.query_params = string_pairs(event.get("query"))
                    .map(|(k, v)| (url_decode(&k), url_decode(&v)))
                    .collect();
                request
            }
            (None, None) => return Err(ConfigurationError::missing_route_indicator()),
        };

        request.headers = string_pairs(event.get("headers"))
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        request.body = match event.get("body") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };

        Ok(request)
    }
}

/// Iterate an optional JSON object as string pairs.
///
/// A missing or null map is empty; non-string scalars are stringified and
/// nulls are dropped.
fn string_pairs(value: Option<&Value>) -> impl Iterator<Item = (String, String)> + '_ {
    value
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(Map::iter)
        .filter_map(|(k, v)| {
            let v = match v {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((k.clone(), v))
        })
}

/// Form-style decode: `+` is a space, then percent-decoding.
///
/// Values that do not decode to UTF-8 are kept as given.
pub fn url_decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}
