use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gwrouter::fields::{FieldRegistry, FieldType, FieldValue, RegexField, TokenField, Validator};
use gwrouter::router::{RouteSpec, Router};
use gwrouter::server::{Body, CanonicalRequest};
use gwrouter::Dispatcher;
use http::Method;
use serde_json::{json, Value};

mod common;
use common::handlers::echo_params;

static TRACKER_INSTANCES: AtomicUsize = AtomicUsize::new(0);

/// Stateful validator: counts how often it is constructed.
struct Tracker {
    allowed: Vec<&'static str>,
}

impl Default for Tracker {
    fn default() -> Self {
        TRACKER_INSTANCES.fetch_add(1, Ordering::SeqCst);
        Self {
            allowed: vec!["fitbit", "nikeplus", "vivosmart"],
        }
    }
}

impl Validator for Tracker {
    fn validate(&self, value: &str) -> bool {
        self.allowed.contains(&value)
    }
}

/// Coerces into an integer, but only even ones.
#[derive(Default)]
struct EvenNumber;

impl Validator for EvenNumber {
    fn validate(&self, value: &str) -> bool {
        self.coerce(value).is_some()
    }

    fn coerce(&self, value: &str) -> Option<FieldValue> {
        value
            .parse::<i64>()
            .ok()
            .filter(|n| n % 2 == 0)
            .map(FieldValue::Integer)
    }

    fn name(&self) -> &str {
        "even"
    }
}

fn get(resource: &str) -> CanonicalRequest {
    CanonicalRequest::new(Method::GET, resource).with_resource(resource)
}

fn body_json(body: &Body) -> Value {
    match body {
        Body::Encoded(s) => serde_json::from_str(s).unwrap(),
        Body::Value(v) => v.clone(),
    }
}

#[test]
fn test_custom_class_cached_once_across_routes() {
    let mut router = Router::new();
    router
        .add(RouteSpec::get("/trackers/{name}", echo_params).param("name", FieldType::of::<Tracker>()))
        .unwrap();
    let first = Arc::clone(router.fields().cached(&FieldType::of::<Tracker>()).unwrap());
    let constructed = TRACKER_INSTANCES.load(Ordering::SeqCst);

    router
        .add(
            RouteSpec::get("/users/{id}/trackers/{name}", echo_params)
                .param("id", FieldType::integer())
                .param("name", FieldType::of::<Tracker>()),
        )
        .unwrap();
    let second = router.fields().cached(&FieldType::of::<Tracker>()).unwrap();

    assert!(Arc::ptr_eq(&first, second));
    assert_eq!(TRACKER_INSTANCES.load(Ordering::SeqCst), constructed);

    let dispatcher = Dispatcher::new(router);
    let res = dispatcher.dispatch(get("/trackers/{name}").with_path_param("name", "fitbit"));
    assert_eq!(res.status, 200);
    let res = dispatcher.dispatch(
        get("/users/{id}/trackers/{name}")
            .with_path_param("id", "3")
            .with_path_param("name", "garmin"),
    );
    assert_eq!(res.status, 404);
    // dispatch never constructs more instances
    assert_eq!(TRACKER_INSTANCES.load(Ordering::SeqCst), constructed);
}

#[test]
fn test_instance_validators_are_not_cached() {
    let mut router = Router::new();
    let before = router.fields().len();
    router
        .add(
            RouteSpec::get("/codes/{code}", echo_params)
                .param("code", FieldType::regex(r"[0-9a-f]{8}$").unwrap()),
        )
        .unwrap();
    assert_eq!(router.fields().len(), before);
    assert!(!router.fields().contains::<RegexField>());

    let dispatcher = Dispatcher::new(router);
    let res = dispatcher.dispatch(get("/codes/{code}").with_path_param("code", "00102c03"));
    assert_eq!(res.status, 200);
    assert_eq!(body_json(&res.body), json!({"code": "00102c03"}));

    let res = dispatcher.dispatch(get("/codes/{code}").with_path_param("code", "#0010203"));
    assert_eq!(res.status, 404);
}

#[test]
fn test_custom_coercion_type_reaches_handler() {
    let mut router = Router::new();
    router
        .add(
            RouteSpec::get("/pairs/{n}", |inv| Ok(json!({ "half": inv.params.int("n").map(|n| n / 2) })))
                .param("n", FieldType::of::<EvenNumber>()),
        )
        .unwrap();
    let dispatcher = Dispatcher::new(router);

    let res = dispatcher.dispatch(get("/pairs/{n}").with_path_param("n", "10"));
    assert_eq!(body_json(&res.body), json!({"half": 5}));

    let res = dispatcher.dispatch(get("/pairs/{n}").with_path_param("n", "7"));
    assert_eq!(res.status, 404);
    let message = body_json(&res.body)["error_message"].as_str().unwrap().to_string();
    assert!(message.contains("even()"), "{message}");
}

#[test]
fn test_token_field_via_dispatch() {
    let mut router = Router::new();
    router
        .add(RouteSpec::get("/bikes/{bike_name}", echo_params).param("bike_name", FieldType::token()))
        .unwrap();
    let dispatcher = Dispatcher::new(router);

    for ok in ["hello-world", "abc_123", "scott"] {
        let res = dispatcher.dispatch(get("/bikes/{bike_name}").with_path_param("bike_name", ok));
        assert_eq!(res.status, 200, "{ok}");
    }
    for bad in ["hello@x", "a b", "$$$"] {
        let res = dispatcher.dispatch(get("/bikes/{bike_name}").with_path_param("bike_name", bad));
        assert_eq!(res.status, 404, "{bad}");
    }
}

#[test]
fn test_overriding_builtin_token_validator() {
    let mut fields = FieldRegistry::new();
    fields.register_for::<TokenField>(RegexField::new(r"[a-z]+$").unwrap());
    let mut router = Router::with_fields(fields);
    router
        .add(RouteSpec::get("/users/{username}", echo_params).param("username", FieldType::token()))
        .unwrap();
    let dispatcher = Dispatcher::new(router);

    let res = dispatcher.dispatch(get("/users/{username}").with_path_param("username", "scott"));
    assert_eq!(res.status, 200);
    let res = dispatcher.dispatch(get("/users/{username}").with_path_param("username", "hello-world"));
    assert_eq!(res.status, 404);
}

#[test]
fn test_uuid_param() {
    let mut router = Router::new();
    router
        .add(
            RouteSpec::get("/profiles/{pid}", |inv| {
                Ok(json!({ "version": inv.params.uuid("pid").map(|u| u.get_version_num()) }))
            })
            .param("pid", FieldType::uuid()),
        )
        .unwrap();
    let dispatcher = Dispatcher::new(router);

    let res = dispatcher.dispatch(
        get("/profiles/{pid}").with_path_param("pid", "9b2b6f56-7a4c-4e0b-9a43-3cf2b0cf6d1e"),
    );
    assert_eq!(body_json(&res.body), json!({"version": 4}));

    let res = dispatcher.dispatch(get("/profiles/{pid}").with_path_param("pid", "INVALID"));
    assert_eq!(res.status, 404);
}

#[test]
fn test_long_integer_id_reaches_handler() {
    let mut router = Router::new();
    router
        .add(RouteSpec::get("/orders/{id}", echo_params).param("id", FieldType::integer()))
        .unwrap();
    let dispatcher = Dispatcher::new(router);

    let res = dispatcher.dispatch(get("/orders/{id}").with_path_param("id", "12345678901234567890"));
    assert_eq!(res.status, 200);
    assert_eq!(body_json(&res.body), json!({"id": "12345678901234567890"}));

    let res = dispatcher.dispatch(get("/orders/{id}").with_path_param("id", "42"));
    assert_eq!(body_json(&res.body), json!({"id": 42}));
}
