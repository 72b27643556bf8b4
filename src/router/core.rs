//! Router core module - the route table.
//!
//! Registrations are bucketed by their exact template string. A bucket may
//! hold several registrations (typically one per method); whether they
//! conflict is only decided when a request arrives.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::Method;
use smallvec::SmallVec;
use tracing::{debug, info};

use super::pattern::{CompiledPattern, PatternError};
use crate::dispatcher::{handler_fn, Handler, Invocation, Reply};
use crate::errors::RouteError;
use crate::fields::{FieldRegistry, FieldType, ParamDecl};
use crate::server::CanonicalRequest;

/// Maximum number of path parameters before heap allocation.
/// Most routes have ≤4 path params (e.g., /users/{id}/posts/{postId}).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Raw (pre-coercion) path parameters in capture order.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Allowed methods of a registration. Empty means any method.
pub type MethodVec = SmallVec<[Method; 4]>;

/// A single registration: template, handler, allowed methods and parameter declarations.
pub struct RouteEntry {
    template: Arc<str>,
    pattern: CompiledPattern,
    handler: Arc<dyn Handler>,
    methods: MethodVec,
    params: Vec<ParamDecl>,
}

impl RouteEntry {
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    #[must_use]
    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    #[must_use]
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    #[must_use]
    pub fn params(&self) -> &[ParamDecl] {
        &self.params
    }

    /// Whether this registration accepts `method`. An empty method list accepts all.
    #[inline]
    #[must_use]
    pub fn allows(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("template", &self.template)
            .field("methods", &self.methods)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Builder for one registration.
///
/// ```rust
/// use gwrouter::fields::FieldType;
/// use gwrouter::router::{RouteSpec, Router};
/// use serde_json::json;
///
/// let mut router = Router::new();
/// router
///     .add(
///         RouteSpec::get("/articles/{year}/{month}/", |inv| {
///             Ok(json!({ "year": inv.params.int("year"), "month": inv.params.int("month") }))
///         })
///         .param("year", FieldType::integer())
///         .param("month", FieldType::integer()),
///     )
///     .unwrap();
/// assert_eq!(router.len(), 1);
/// ```
pub struct RouteSpec {
    template: String,
    methods: MethodVec,
    params: Vec<ParamDecl>,
    handler: Arc<dyn Handler>,
}

impl RouteSpec {
    /// Wildcard-method registration backed by a closure.
    pub fn new<F, R>(template: &str, handler: F) -> Self
    where
        F: Fn(&mut Invocation) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply> + 'static,
    {
        Self::with_handler(template, handler_fn(handler))
    }

    /// Wildcard-method registration backed by any [`Handler`].
    pub fn with_handler(template: &str, handler: Arc<dyn Handler>) -> Self {
        Self {
            template: template.to_string(),
            methods: MethodVec::new(),
            params: Vec::new(),
            handler,
        }
    }

    pub fn get<F, R>(template: &str, handler: F) -> Self
    where
        F: Fn(&mut Invocation) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply> + 'static,
    {
        Self::new(template, handler).method(Method::GET)
    }

    pub fn post<F, R>(template: &str, handler: F) -> Self
    where
        F: Fn(&mut Invocation) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply> + 'static,
    {
        Self::new(template, handler).method(Method::POST)
    }

    pub fn put<F, R>(template: &str, handler: F) -> Self
    where
        F: Fn(&mut Invocation) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply> + 'static,
    {
        Self::new(template, handler).method(Method::PUT)
    }

    pub fn patch<F, R>(template: &str, handler: F) -> Self
    where
        F: Fn(&mut Invocation) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply> + 'static,
    {
        Self::new(template, handler).method(Method::PATCH)
    }

    pub fn delete<F, R>(template: &str, handler: F) -> Self
    where
        F: Fn(&mut Invocation) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply> + 'static,
    {
        Self::new(template, handler).method(Method::DELETE)
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    #[must_use]
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods.extend(methods);
        self
    }

    /// Declare the type a path parameter is coerced into.
    #[must_use]
    pub fn param(mut self, name: &str, ty: FieldType) -> Self {
        self.params.push(ParamDecl::new(name, ty));
        self
    }
}

/// The route table.
///
/// Mutated only during setup; once handed to a
/// [`Dispatcher`](crate::dispatcher::Dispatcher) it is read-only and shared
/// by all concurrent dispatches.
#[derive(Default)]
pub struct Router {
    /// Registrations in registration order.
    entries: Vec<RouteEntry>,
    /// Template string -> indices into `entries`.
    buckets: HashMap<String, SmallVec<[usize; 2]>>,
    fields: FieldRegistry,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a pre-configured field registry (e.g. with overridden built-ins).
    #[must_use]
    pub fn with_fields(fields: FieldRegistry) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Register a handler under `template`.
    ///
    /// Compiles the template, caches every class-based parameter type in the
    /// field registry and appends the registration to the template's bucket.
    /// Duplicate or conflicting registrations are accepted here; they surface
    /// as [`RouteError::Ambiguous`] when a request hits them.
    pub fn add_route(
        &mut self,
        template: &str,
        methods: impl IntoIterator<Item = Method>,
        handler: Arc<dyn Handler>,
        params: Vec<ParamDecl>,
    ) -> Result<&mut Self, PatternError> {
        let pattern = CompiledPattern::compile(template)?;

        for decl in &params {
            self.fields.warm(&decl.ty);
        }

        let methods: MethodVec = methods.into_iter().collect();
        let index = self.entries.len();
        let bucket = self.buckets.entry(template.to_string()).or_default();
        bucket.push(index);

        if bucket.len() > 1 {
            debug!(
                template = %template,
                registrations = bucket.len(),
                "Template bucket now holds multiple registrations"
            );
        }

        info!(
            template = %template,
            methods = ?methods,
            params = ?params.iter().map(|p| p.name.as_ref()).collect::<Vec<_>>(),
            total_routes = index + 1,
            "Route registered"
        );

        self.entries.push(RouteEntry {
            template: Arc::from(template),
            pattern,
            handler,
            methods,
            params,
        });
        Ok(self)
    }

    /// Register a [`RouteSpec`].
    pub fn add(&mut self, spec: RouteSpec) -> Result<&mut Self, PatternError> {
        let RouteSpec {
            template,
            methods,
            params,
            handler,
        } = spec;
        self.add_route(&template, methods, handler, params)
    }

    /// Wildcard-method registration without parameter declarations.
    pub fn route<F, R>(&mut self, template: &str, handler: F) -> Result<&mut Self, PatternError>
    where
        F: Fn(&mut Invocation) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply> + 'static,
    {
        self.add(RouteSpec::new(template, handler))
    }

    pub fn get<F, R>(&mut self, template: &str, handler: F) -> Result<&mut Self, PatternError>
    where
        F: Fn(&mut Invocation) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply> + 'static,
    {
        self.add(RouteSpec::get(template, handler))
    }

    pub fn post<F, R>(&mut self, template: &str, handler: F) -> Result<&mut Self, PatternError>
    where
        F: Fn(&mut Invocation) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply> + 'static,
    {
        self.add(RouteSpec::post(template, handler))
    }

    pub fn put<F, R>(&mut self, template: &str, handler: F) -> Result<&mut Self, PatternError>
    where
        F: Fn(&mut Invocation) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply> + 'static,
    {
        self.add(RouteSpec::put(template, handler))
    }

    pub fn patch<F, R>(&mut self, template: &str, handler: F) -> Result<&mut Self, PatternError>
    where
        F: Fn(&mut Invocation) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply> + 'static,
    {
        self.add(RouteSpec::patch(template, handler))
    }

    pub fn delete<F, R>(&mut self, template: &str, handler: F) -> Result<&mut Self, PatternError>
    where
        F: Fn(&mut Invocation) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply> + 'static,
    {
        self.add(RouteSpec::delete(template, handler))
    }

    /// Map a raw path to its template by structural matching.
    ///
    /// Patterns are tried in registration order and the first match wins.
    /// No match yields `(None, empty)`; deciding what that means is up to the caller.
    #[must_use]
    pub fn resolve_path(&self, path: &str) -> (Option<&str>, ParamVec) {
        for entry in &self.entries {
            if let Some(params) = entry.pattern.captures(path) {
                debug!(
                    path = %path,
                    template = %entry.template,
                    path_params = ?params,
                    "Path resolved to template"
                );
                return (Some(entry.template()), params);
            }
        }
        debug!(path = %path, "Path did not match any template");
        (None, ParamVec::new())
    }

    /// Select the single registration serving `request`.
    ///
    /// # Errors
    ///
    /// * [`RouteError::NotFound`] - no bucket for the request's resource key
    /// * [`RouteError::MethodNotAllowed`] - bucket exists, no registration allows the method
    /// * [`RouteError::Ambiguous`] - more than one registration allows the method
    pub fn find_route(&self, request: &CanonicalRequest) -> Result<&RouteEntry, RouteError> {
        let resource = request.resource.as_deref();
        let bucket = resource
            .and_then(|r| self.buckets.get(r))
            .filter(|b| !b.is_empty())
            .ok_or_else(|| RouteError::NotFound {
                resource: resource.map(str::to_string),
            })?;
        // bucket is non-empty only when resource is Some
        let resource = resource.unwrap_or_default();

        let mut candidates = bucket
            .iter()
            .filter_map(|&idx| self.entries.get(idx))
            .filter(|entry| entry.allows(&request.method));

        let Some(found) = candidates.next() else {
            return Err(RouteError::MethodNotAllowed {
                method: request.method.clone(),
                resource: resource.to_string(),
            });
        };

        let extra = candidates.count();
        if extra > 0 {
            debug!(
                method = %request.method,
                resource = %resource,
                candidates = extra + 1,
                "Ambiguous route configuration"
            );
            return Err(RouteError::Ambiguous {
                method: request.method.clone(),
                resource: resource.to_string(),
                candidates: extra + 1,
            });
        }

        Ok(found)
    }

    #[must_use]
    pub fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    /// Mutable access to the field registry, for overriding built-ins during setup.
    pub fn fields_mut(&mut self) -> &mut FieldRegistry {
        &mut self.fields
    }

    /// Distinct templates in first-registration order.
    #[must_use]
    pub fn templates(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.buckets.len());
        for entry in &self.entries {
            if !seen.contains(&entry.template()) {
                seen.push(entry.template());
            }
        }
        seen
    }

    /// Number of registrations (not templates).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Log the whole table at info level.
    pub fn dump_routes(&self) {
        info!(count = self.entries.len(), "Route table");
        for entry in &self.entries {
            info!(
                template = %entry.template,
                methods = ?entry.methods,
                regex = %entry.pattern.regex_source(),
                "Route"
            );
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("entries", &self.entries)
            .field("fields", &self.fields)
            .finish()
    }
}
