use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error};

use super::request::{CanonicalEventAdapter, CanonicalRequest, EventAdapter};
use super::response::TransportResponse;
use crate::dispatcher::Dispatcher;
use crate::errors::ConfigurationError;

/// Outward entry point: raw event in, transport response out.
///
/// Cheap to clone; clones share the dispatcher.
#[derive(Clone)]
pub struct AppService {
    dispatcher: Arc<Dispatcher>,
    adapters: Vec<Arc<dyn EventAdapter>>,
}

impl AppService {
    /// Service accepting events in the canonical JSON shape.
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            adapters: vec![Arc::new(CanonicalEventAdapter)],
        }
    }

    /// Service with no adapters; add them with [`AppService::add_adapter`].
    #[must_use]
    pub fn without_adapters(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            adapters: Vec::new(),
        }
    }

    /// Append an adapter. Adapters are tried in the order added.
    pub fn add_adapter(&mut self, adapter: Arc<dyn EventAdapter>) {
        self.adapters.push(adapter);
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle one raw event.
    ///
    /// `context` is passed through to handlers untouched.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError`] when no adapter understands the event or the
    /// matching adapter cannot identify the route. No response is produced
    /// in that case.
    pub fn handle<C: Any + Send + Sync>(
        &self,
        event: &Value,
        context: C,
    ) -> Result<TransportResponse, ConfigurationError> {
        let adapter = self
            .adapters
            .iter()
            .find(|a| a.matches(event))
            .ok_or_else(|| {
                error!(adapters = self.adapters.len(), "No event adapter matches the event");
                ConfigurationError::new("no event adapter recognises the event")
            })?;

        let request = adapter
            .build(event, self.dispatcher.router())
            .inspect_err(|e| error!(error = %e, "Event adaptation failed"))?
            .with_context(Arc::new(context));

        debug!(
            method = %request.method,
            path = %request.path,
            "Event adapted"
        );
        Ok(self.handle_request(request))
    }

    /// Dispatch an already-canonical request.
    #[must_use]
    pub fn handle_request(&self, request: CanonicalRequest) -> TransportResponse {
        self.dispatcher.dispatch(request).into()
    }
}

impl fmt::Debug for AppService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppService")
            .field("dispatcher", &self.dispatcher)
            .field("adapters", &self.adapters.len())
            .finish()
    }
}
