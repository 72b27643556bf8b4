use std::time::Duration;

use crate::server::{CanonicalRequest, Response};

/// Post-dispatch step.
///
/// Runs once per request after the handler (or the error handlers) produced
/// the response, in registration order. An error aborts the remaining
/// middleware for that request and is converted into the response by the
/// same classifier the dispatcher uses for handler errors.
pub trait Middleware: Send + Sync {
    fn after(
        &self,
        req: &CanonicalRequest,
        res: &mut Response,
        latency: Duration,
    ) -> anyhow::Result<()>;
}
