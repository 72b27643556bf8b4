use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, error, field, info_span, warn};

use crate::errors::DispatchError;
use crate::fields::Params;
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::middleware::{
    ApplicationErrorHandler, ContentTypeMiddleware, ExceptionHandler, Middleware,
};
use crate::router::Router;
use crate::runtime_config::RuntimeConfig;
use crate::server::{Body, CanonicalRequest, Response};

/// What a handler produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Becomes the response body; status and headers stay as the handler
    /// left them on [`Invocation::response`].
    Body(Value),
    /// Replaces the ambient response entirely.
    Response(Response),
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Body(value)
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::Response(response)
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Body(Value::String(text))
    }
}

impl From<&'static str> for Reply {
    fn from(text: &'static str) -> Self {
        Reply::Body(Value::String(text.to_string()))
    }
}

impl From<()> for Reply {
    fn from((): ()) -> Self {
        Reply::Body(Value::Null)
    }
}

/// Per-invocation state handed to the handler.
///
/// One instance per dispatch; nothing in it is shared with concurrent
/// invocations.
#[derive(Debug)]
pub struct Invocation {
    pub request: CanonicalRequest,
    /// Path parameters after coercion.
    pub params: Params,
    /// Ambient response; handlers may set status and headers here.
    pub response: Response,
    pub request_id: RequestId,
}

impl Invocation {
    /// Typed access to the opaque context passed to [`AppService::handle`](crate::server::AppService::handle).
    #[must_use]
    pub fn context<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.request.context::<T>()
    }
}

/// A routed handler.
pub trait Handler: Send + Sync {
    fn handle(&self, inv: &mut Invocation) -> anyhow::Result<Reply>;
}

/// Adapter from a closure to [`Handler`].
pub struct FnHandler<F, R> {
    f: F,
    _reply: PhantomData<fn() -> R>,
}

impl<F, R> Handler for FnHandler<F, R>
where
    F: Fn(&mut Invocation) -> anyhow::Result<R> + Send + Sync + 'static,
    R: Into<Reply> + 'static,
{
    fn handle(&self, inv: &mut Invocation) -> anyhow::Result<Reply> {
        (self.f)(inv).map(Into::into)
    }
}

/// Wrap a closure as a shareable handler.
pub fn handler_fn<F, R>(f: F) -> Arc<dyn Handler>
where
    F: Fn(&mut Invocation) -> anyhow::Result<R> + Send + Sync + 'static,
    R: Into<Reply> + 'static,
{
    Arc::new(FnHandler {
        f,
        _reply: PhantomData,
    })
}

/// Runs one request through route lookup, coercion, the handler, the error
/// handlers and the middleware chain.
///
/// The dispatcher owns the router; once constructed both are read-only and
/// `dispatch` may be called concurrently.
pub struct Dispatcher {
    router: Router,
    /// Ordered list of middleware to apply to responses
    middlewares: Vec<Arc<dyn Middleware>>,
    content: ContentTypeMiddleware,
    app_errors: ApplicationErrorHandler,
    faults: ExceptionHandler,
}

impl Dispatcher {
    #[must_use]
    pub fn new(router: Router) -> Self {
        Self {
            router,
            middlewares: Vec::new(),
            content: ContentTypeMiddleware::new(),
            app_errors: ApplicationErrorHandler,
            faults: ExceptionHandler::new(false),
        }
    }

    #[must_use]
    pub fn from_config(router: Router, config: &RuntimeConfig) -> Self {
        Self::new(router).with_debug(config.debug)
    }

    /// Toggle debug error bodies.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.faults = ExceptionHandler::new(debug);
        self
    }

    #[must_use]
    pub fn debug(&self) -> bool {
        self.faults.debug()
    }

    /// Append a middleware; they run in the order added.
    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        debug!(
            middleware_name = std::any::type_name_of_val(mw.as_ref()),
            position = self.middlewares.len(),
            "Middleware added"
        );
        self.middlewares.push(mw);
    }

    /// The content transformer registry, for adding content types.
    pub fn content_types_mut(&mut self) -> &mut ContentTypeMiddleware {
        &mut self.content
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Dispatch a request. Always yields a response.
    pub fn dispatch(&self, request: CanonicalRequest) -> Response {
        let request_id = RequestId::from_header_or_new(request.header(REQUEST_ID_HEADER));
        let span = info_span!(
            "dispatch",
            request_id = %request_id,
            method = %request.method,
            resource = request.resource.as_deref().unwrap_or("-"),
            status = field::Empty,
            latency_ms = field::Empty,
        );
        let _entered = span.enter();

        let start = Instant::now();
        let mut inv = Invocation {
            request,
            params: Params::new(),
            response: Response::new(),
            request_id,
        };

        if let Err(err) = self.invoke(&mut inv) {
            self.handle_error(&mut inv.response, err);
        }

        self.run_middleware(&mut inv, start.elapsed());
        inv.response
    }

    fn invoke(&self, inv: &mut Invocation) -> Result<(), DispatchError> {
        let entry = self.router.find_route(&inv.request)?;
        inv.params = self
            .router
            .fields()
            .coerce(entry.params(), &inv.request.path_params)?;

        debug!(
            template = %entry.template(),
            params = ?inv.params,
            "Invoking handler"
        );

        let handler = entry.handler();
        let reply = match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(inv))) {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => return Err(DispatchError::classify(err)),
            Err(payload) => return Err(DispatchError::from_panic(payload, "handler")),
        };

        match reply {
            Reply::Body(value) => inv.response.body = Body::Value(value),
            Reply::Response(response) => inv.response = response,
        }
        Ok(())
    }

    /// Two-tier conversion of an error into the response.
    fn handle_error(&self, res: &mut Response, err: DispatchError) {
        match err {
            DispatchError::Classified(err) => self.app_errors.handle(res, &err),
            DispatchError::Fault(err) => self.faults.handle(res, &err),
        }
    }

    fn run_middleware(&self, inv: &mut Invocation, latency: Duration) {
        let Invocation {
            request, response, ..
        } = inv;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> anyhow::Result<()> {
            for mw in &self.middlewares {
                mw.after(request, response, latency)?;
            }
            Ok(())
        }));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(DispatchError::classify(err)),
            Err(payload) => Some(DispatchError::from_panic(payload, "middleware")),
        };
        if let Some(err) = failure {
            warn!(error = %err, "Middleware chain failed");
            self.handle_error(response, err);
        }

        if let Err(err) = self.content.after(request, response, latency) {
            error!(error = %err, "Content transformer failed");
            self.faults.handle(response, &err);
            ContentTypeMiddleware::force_json(response);
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("router", &self.router)
            .field("middlewares", &self.middlewares.len())
            .field("content", &self.content)
            .field("debug", &self.faults.debug())
            .finish()
    }
}
