use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use super::Middleware;
use crate::server::{Body, CanonicalRequest, Response};

/// Encodes a structured body into its wire text.
pub trait ContentTransformer: Send + Sync {
    fn transform(&self, body: &Value) -> anyhow::Result<String>;
}

/// `application/json` encoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonTransformer;

impl ContentTransformer for JsonTransformer {
    fn transform(&self, body: &Value) -> anyhow::Result<String> {
        Ok(serde_json::to_string(body)?)
    }
}

/// Registry of content transformers keyed by content-type prefix.
///
/// The first registered prefix the response's `Content-Type` starts with
/// (ignoring ASCII case) wins. Responses with no matching transformer, or
/// whose body is already encoded, are left untouched.
pub struct ContentTypeMiddleware {
    transformers: Vec<(String, Arc<dyn ContentTransformer>)>,
}

impl Default for ContentTypeMiddleware {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("application/json", Arc::new(JsonTransformer));
        registry
    }
}

impl ContentTypeMiddleware {
    /// Registry with the JSON transformer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with no transformers at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            transformers: Vec::new(),
        }
    }

    /// Register (or replace) the transformer for a content-type prefix.
    pub fn register(&mut self, content_type: &str, transformer: Arc<dyn ContentTransformer>) {
        let key = content_type.to_ascii_lowercase();
        match self.transformers.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = transformer,
            None => self.transformers.push((key, transformer)),
        }
    }

    #[must_use]
    pub fn transformer_for(&self, content_type: &str) -> Option<&Arc<dyn ContentTransformer>> {
        let content_type = content_type.to_ascii_lowercase();
        self.transformers
            .iter()
            .find(|(prefix, _)| content_type.starts_with(prefix.as_str()))
            .map(|(_, t)| t)
    }

    /// Encode the response body in place.
    pub fn transform(&self, res: &mut Response) -> anyhow::Result<()> {
        let Body::Value(value) = &res.body else {
            return Ok(());
        };
        let Some(transformer) = res.content_type().and_then(|ct| self.transformer_for(ct)) else {
            debug!(content_type = ?res.content_type(), "No content transformer, body left as is");
            return Ok(());
        };
        let encoded = transformer.transform(value)?;
        res.body = Body::Encoded(encoded);
        Ok(())
    }

    /// Last-resort encoding used when a transformer itself failed.
    pub(crate) fn force_json(res: &mut Response) {
        if let Body::Value(value) = &res.body {
            res.body = Body::Encoded(value.to_string());
        }
    }
}

impl Middleware for ContentTypeMiddleware {
    fn after(&self, _req: &CanonicalRequest, res: &mut Response, _latency: Duration) -> anyhow::Result<()> {
        self.transform(res)
    }
}

impl fmt::Debug for ContentTypeMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.transformers.iter().map(|(k, _)| k))
            .finish()
    }
}
