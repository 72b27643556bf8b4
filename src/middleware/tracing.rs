use std::time::Duration;

use tracing::{info, Span};

use super::Middleware;
use crate::server::{CanonicalRequest, Response};

/// Records the final status and latency on the dispatch span and logs one
/// completion line per request.
///
/// Register it last to capture what the other middleware did to the response.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn after(&self, req: &CanonicalRequest, res: &mut Response, latency: Duration) -> anyhow::Result<()> {
        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        let span = Span::current();
        span.record("status", res.status);
        span.record("latency_ms", latency_ms);

        info!(
            method = %req.method,
            path = %req.path,
            status = res.status,
            latency_ms,
            "Request completed"
        );
        Ok(())
    }
}
