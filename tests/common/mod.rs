#![allow(dead_code)]

pub mod events {
    use serde_json::{json, Value};

    /// Canonical event carrying a pre-resolved resource.
    pub fn resource_event(method: &str, resource: &str, path_params: Value) -> Value {
        json!({
            "method": method,
            "resource": resource,
            "path": resource,
            "headers": {"Content-Type": "application/json"},
            "query": {},
            "path_params": path_params,
            "body": null,
        })
    }

    /// Load-balancer style event: only the raw path is known.
    pub fn path_event(method: &str, path: &str) -> Value {
        json!({
            "method": method,
            "path": path,
            "headers": {"content-type": "application/json"},
            "query": null,
            "body": null,
        })
    }

    pub fn with_body(mut event: Value, body: &str) -> Value {
        event["body"] = Value::String(body.to_string());
        event
    }
}

pub mod handlers {
    use gwrouter::errors::ApplicationError;
    use gwrouter::Invocation;
    use serde_json::{json, Value};

    pub fn hello(_: &mut Invocation) -> anyhow::Result<Value> {
        Ok(json!({"hello": "world"}))
    }

    pub fn echo_params(inv: &mut Invocation) -> anyhow::Result<Value> {
        Ok(inv.params.to_json())
    }

    pub fn echo_method(inv: &mut Invocation) -> anyhow::Result<Value> {
        Ok(json!({"method": inv.request.method.as_str()}))
    }

    pub fn fails(_: &mut Invocation) -> anyhow::Result<Value> {
        Err(anyhow::anyhow!("something went very wrong"))
    }

    pub fn bad_request(_: &mut Invocation) -> anyhow::Result<Value> {
        Err(ApplicationError::bad_request("The field 'name' is required.").into())
    }

    pub fn panics(_: &mut Invocation) -> anyhow::Result<Value> {
        panic!("handler blew up")
    }
}

pub mod tracing_capture {
    use std::sync::{Arc, Mutex};

    use tracing::field::{Field, Visit};
    use tracing::span::{Attributes, Id, Record};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::registry::LookupSpan;
    use tracing_subscriber::{Layer, Registry};

    #[derive(Debug, Clone, Default)]
    pub struct Captured {
        pub spans: Vec<String>,
        /// (field, value) pairs recorded on spans after creation.
        pub span_records: Vec<(String, String)>,
        /// Each event as its fields, `message` and `level` included.
        pub events: Vec<Vec<(String, String)>>,
    }

    impl Captured {
        pub fn event_with_message(&self, message: &str) -> Option<&Vec<(String, String)>> {
            self.events
                .iter()
                .find(|fields| fields.iter().any(|(k, v)| k == "message" && v == message))
        }

        pub fn events_at(&self, level: &str) -> Vec<&Vec<(String, String)>> {
            self.events
                .iter()
                .filter(|fields| fields.iter().any(|(k, v)| k == "level" && v == level))
                .collect()
        }
    }

    #[derive(Default)]
    struct FieldVisitor(Vec<(String, String)>);

    impl Visit for FieldVisitor {
        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.push((field.name().to_string(), value.to_string()));
        }

        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            self.0.push((field.name().to_string(), format!("{value:?}")));
        }
    }

    struct CaptureLayer(Arc<Mutex<Captured>>);

    impl<S> Layer<S> for CaptureLayer
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
            self.0.lock().unwrap().spans.push(attrs.metadata().name().to_string());
        }

        fn on_record(&self, _id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
            let mut visitor = FieldVisitor::default();
            values.record(&mut visitor);
            self.0.lock().unwrap().span_records.extend(visitor.0);
        }

        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = FieldVisitor::default();
            event.record(&mut visitor);
            visitor
                .0
                .push(("level".to_string(), event.metadata().level().to_string()));
            self.0.lock().unwrap().events.push(visitor.0);
        }
    }

    /// Thread-local subscriber capturing spans and events for the test's lifetime.
    pub struct TestTracing {
        captured: Arc<Mutex<Captured>>,
        _guard: tracing::subscriber::DefaultGuard,
    }

    impl TestTracing {
        pub fn init() -> Self {
            let captured = Arc::new(Mutex::new(Captured::default()));
            let subscriber = Registry::default().with(CaptureLayer(Arc::clone(&captured)));
            let guard = tracing::subscriber::set_default(subscriber);
            Self {
                captured,
                _guard: guard,
            }
        }

        pub fn snapshot(&self) -> Captured {
            self.captured.lock().unwrap().clone()
        }
    }
}
