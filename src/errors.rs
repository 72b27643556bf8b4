//! # Errors Module
//!
//! Error taxonomy for the routing and dispatch pipeline.
//!
//! Errors fall into two tiers:
//!
//! - **Classified** errors ([`RouteError`]) carry the status code the response
//!   should have. Route lookup, parameter coercion and handler-raised
//!   [`ApplicationError`]s all land here.
//! - **Faults** are everything else: arbitrary handler errors, middleware
//!   failures and panics. They always become a 500.
//!
//! [`DispatchError`] is the tagged union of both tiers. The dispatcher is the
//! only place that turns a `DispatchError` into a response; the router and the
//! field registry only ever return errors.
//!
//! [`ConfigurationError`] sits outside both tiers: it means the upstream event
//! could not be adapted at all and is returned to the caller instead of being
//! converted into a response.

use std::any::Any;
use std::borrow::Cow;

use http::{Method, StatusCode};
use thiserror::Error;

/// Status used for parameters that fail coercion.
///
/// An invalid path parameter is treated as "no such resource".
pub const VALIDATION_STATUS: StatusCode = StatusCode::NOT_FOUND;

/// Status used when more than one registration matches a request.
pub const AMBIGUOUS_STATUS: StatusCode = StatusCode::NOT_ACCEPTABLE;

/// Message used when an event lacks the fields needed to identify a route.
pub const CONFIG_ERROR_MSG: &str =
    "Unable to respond. Please make sure the event source forwards the resource or path of the request.";

/// The upstream event could not be turned into a canonical request.
///
/// This signals a misconfigured integration, not a routing failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ConfigurationError: {message}")]
pub struct ConfigurationError {
    pub message: String,
}

impl ConfigurationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The standard "missing resource/path" error.
    #[must_use]
    pub fn missing_route_indicator() -> Self {
        Self::new(CONFIG_ERROR_MSG)
    }
}

/// A path parameter failed coercion against its declared type.
///
/// Only the first failing parameter is ever reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid literal for {validator}() in path parameter '{param}': '{value}'")]
    InvalidValue {
        param: String,
        validator: String,
        value: String,
    },
    #[error("missing path parameter '{param}'")]
    Missing { param: String },
}

impl ValidationError {
    /// Name of the parameter that failed.
    #[must_use]
    pub fn param(&self) -> &str {
        match self {
            ValidationError::InvalidValue { param, .. } | ValidationError::Missing { param } => {
                param
            }
        }
    }

    /// The offending raw value, if one was supplied.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match self {
            ValidationError::InvalidValue { value, .. } => Some(value),
            ValidationError::Missing { .. } => None,
        }
    }
}

/// A classified error raised by application code.
///
/// Handlers return it (through `anyhow`) to pick the response status
/// themselves. The default status is 500.
///
/// ```rust
/// use gwrouter::errors::ApplicationError;
///
/// let err = ApplicationError::bad_request("name is required");
/// assert_eq!(err.status().as_u16(), 400);
/// assert_eq!(err.to_string(), "BadRequestError: name is required");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ApplicationError {
    kind: Cow<'static, str>,
    message: String,
    status: StatusCode,
}

impl ApplicationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: Cow::Borrowed("ApplicationError"),
            message: message.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn with_status(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            status,
            ..Self::new(message)
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            kind: Cow::Borrowed("BadRequestError"),
            message: message.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    /// Override the name shown in front of the message.
    #[must_use]
    pub fn kind(mut self, kind: impl Into<Cow<'static, str>>) -> Self {
        self.kind = kind.into();
        self
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Classified errors: each one knows its response status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("RouteNotFound: The requested URL was not found on the server.")]
    NotFound { resource: Option<String> },
    #[error("MethodNotAllowed: Method is not allowed.")]
    MethodNotAllowed { method: Method, resource: String },
    #[error("AmbiguousRoute: Found multiple views for the \"{method}\" method.")]
    Ambiguous {
        method: Method,
        resource: String,
        candidates: usize,
    },
    #[error("ValidationError: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Application(#[from] ApplicationError),
}

impl RouteError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            RouteError::NotFound { .. } => StatusCode::NOT_FOUND,
            RouteError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            RouteError::Ambiguous { .. } => AMBIGUOUS_STATUS,
            RouteError::Validation(_) => VALIDATION_STATUS,
            RouteError::Application(e) => e.status(),
        }
    }
}

/// Outcome of a failed dispatch step, tagged by tier.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Classified(#[from] RouteError),
    #[error("{0}")]
    Fault(anyhow::Error),
}

impl DispatchError {
    /// Sort an error coming out of application code into its tier.
    ///
    /// Classified error types survive the trip through `anyhow` and are
    /// recovered by downcasting; anything else is a fault.
    #[must_use]
    pub fn classify(err: anyhow::Error) -> Self {
        let err = match err.downcast::<RouteError>() {
            Ok(e) => return DispatchError::Classified(e),
            Err(err) => err,
        };
        let err = match err.downcast::<ApplicationError>() {
            Ok(e) => return DispatchError::Classified(e.into()),
            Err(err) => err,
        };
        match err.downcast::<ValidationError>() {
            Ok(e) => DispatchError::Classified(e.into()),
            Err(err) => DispatchError::Fault(err),
        }
    }

    /// Build a fault from a caught panic payload.
    ///
    /// `origin` names what panicked, e.g. `"handler"` or `"middleware"`.
    #[must_use]
    pub fn from_panic(payload: Box<dyn Any + Send>, origin: &str) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        DispatchError::Fault(anyhow::anyhow!("{origin} panicked: {message}"))
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Classified(e) => e.status(),
            DispatchError::Fault(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn is_fault(&self) -> bool {
        matches!(self, DispatchError::Fault(_))
    }
}

impl From<ValidationError> for DispatchError {
    fn from(err: ValidationError) -> Self {
        DispatchError::Classified(err.into())
    }
}

impl From<ApplicationError> for DispatchError {
    fn from(err: ApplicationError) -> Self {
        DispatchError::Classified(err.into())
    }
}
