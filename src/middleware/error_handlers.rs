use serde_json::json;
use tracing::{error, warn};

use crate::errors::RouteError;
use crate::server::{Body, Response, DEFAULT_CONTENT_TYPE};

/// Body message of a 500 outside debug mode.
pub const DEFAULT_500_MESSAGE: &str = "Internal server error.";

fn reset_for_error(res: &mut Response, status: u16, body: serde_json::Value) {
    res.status = status;
    res.set_header("Content-Type", DEFAULT_CONTENT_TYPE);
    res.body = Body::Value(body);
}

/// First tier: errors that carry their own status.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApplicationErrorHandler;

impl ApplicationErrorHandler {
    pub fn handle(&self, res: &mut Response, err: &RouteError) {
        let status = err.status().as_u16();
        warn!(status, error = %err, "Classified error");
        reset_for_error(res, status, json!({ "error_message": err.to_string() }));
    }
}

/// Second tier: everything else becomes a 500.
///
/// Outside debug mode the body is a fixed payload; in debug mode it carries
/// the error message and a trace: the error chain, plus the backtrace taken
/// where the error was created when `RUST_BACKTRACE` enables capture.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExceptionHandler {
    debug: bool,
}

impl ExceptionHandler {
    #[must_use]
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn handle(&self, res: &mut Response, err: &anyhow::Error) {
        error!(error = %err, chain = ?err, "Unhandled error");
        let body = if self.debug {
            json!({
                "error_message": err.to_string(),
                "trace": format!("{err:?}"),
            })
        } else {
            json!({ "error_message": DEFAULT_500_MESSAGE })
        };
        reset_for_error(res, 500, body);
    }
}
