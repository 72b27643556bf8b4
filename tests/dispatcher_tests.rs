use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gwrouter::dispatcher::{handler_fn, Dispatcher, Handler, Invocation, Reply};
use gwrouter::errors::ApplicationError;
use gwrouter::fields::{FieldType, ParamDecl};
use gwrouter::router::{RouteSpec, Router};
use gwrouter::server::{Body, CanonicalRequest, Response};
use gwrouter::RouteError;
use http::{Method, StatusCode};
use serde_json::{json, Value};

mod common;
use common::handlers::{bad_request, echo_method, echo_params, fails, hello, panics};

fn get(resource: &str) -> CanonicalRequest {
    CanonicalRequest::new(Method::GET, resource).with_resource(resource)
}

fn body_json(res: &Response) -> Value {
    match &res.body {
        Body::Encoded(s) => serde_json::from_str(s).unwrap(),
        Body::Value(v) => v.clone(),
    }
}

fn articles_dispatcher() -> Dispatcher {
    let mut router = Router::new();
    router
        .add(
            RouteSpec::get("/articles/{year}/{month}/", |inv| {
                let year = inv.params.int("year").unwrap_or_default();
                let month = inv.params.int("month").unwrap_or_default();
                Ok(json!({ "year": year, "month": month, "next_year": year + 1 }))
            })
            .param("year", FieldType::integer())
            .param("month", FieldType::integer()),
        )
        .unwrap();
    Dispatcher::new(router)
}

#[test]
fn test_dispatch_success_is_json_encoded() {
    let mut router = Router::new();
    router.get("/hello", hello).unwrap();
    let res = Dispatcher::new(router).dispatch(get("/hello"));

    assert_eq!(res.status, 200);
    assert_eq!(res.get_header("content-type"), Some("application/json"));
    assert_eq!(res.body, Body::Encoded(r#"{"hello":"world"}"#.to_string()));
}

#[test]
fn test_typed_params_reach_handler() {
    let res = articles_dispatcher().dispatch(
        get("/articles/{year}/{month}/")
            .with_path_param("year", "2020")
            .with_path_param("month", "10"),
    );
    assert_eq!(res.status, 200);
    assert_eq!(body_json(&res), json!({"year": 2020, "month": 10, "next_year": 2021}));
}

#[test]
fn test_invalid_param_is_404_before_handler_runs() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let mut router = Router::new();
    router
        .add(
            RouteSpec::get("/articles/{year}/{month}/", move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(json!({}))
            })
            .param("year", FieldType::integer())
            .param("month", FieldType::integer()),
        )
        .unwrap();

    let res = Dispatcher::new(router).dispatch(
        get("/articles/{year}/{month}/")
            .with_path_param("year", "2020")
            .with_path_param("month", "13x"),
    );
    assert_eq!(res.status, 404);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let message = body_json(&res)["error_message"].as_str().unwrap().to_string();
    assert!(message.contains("13x"), "{message}");
    assert!(message.starts_with("ValidationError"), "{message}");
}

#[test]
fn test_only_first_invalid_param_is_reported() {
    let res = articles_dispatcher().dispatch(
        get("/articles/{year}/{month}/")
            .with_path_param("year", "hello")
            .with_path_param("month", "world"),
    );
    assert_eq!(res.status, 404);
    let message = body_json(&res)["error_message"].to_string();
    assert!(message.contains("hello"));
    assert!(!message.contains("world"));
}

#[test]
fn test_missing_declared_param_is_404() {
    let res = articles_dispatcher().dispatch(get("/articles/{year}/{month}/").with_path_param("year", "2020"));
    assert_eq!(res.status, 404);
}

#[test]
fn test_routing_errors() {
    let mut router = Router::new();
    router.get("/events/", hello).unwrap();
    router.get("/dupes/", hello).unwrap();
    router.get("/dupes/", hello).unwrap();
    router.post("/dupes/", echo_method).unwrap();
    let dispatcher = Dispatcher::new(router);

    let res = dispatcher.dispatch(get("/nowhere/"));
    assert_eq!(res.status, 404);
    assert_eq!(
        body_json(&res),
        json!({"error_message": "RouteNotFound: The requested URL was not found on the server."})
    );

    let res = dispatcher.dispatch(CanonicalRequest::new(Method::DELETE, "/events/").with_resource("/events/"));
    assert_eq!(res.status, 405);

    let res = dispatcher.dispatch(get("/dupes/"));
    assert_eq!(res.status, StatusCode::NOT_ACCEPTABLE.as_u16());
    assert!(body_json(&res)["error_message"]
        .as_str()
        .unwrap()
        .starts_with("AmbiguousRoute"));

    let res = dispatcher.dispatch(CanonicalRequest::new(Method::POST, "/dupes/").with_resource("/dupes/"));
    assert_eq!(res.status, 200);
    assert_eq!(body_json(&res), json!({"method": "POST"}));
}

#[test]
fn test_request_without_resource_is_not_found() {
    let mut router = Router::new();
    router.get("/events/", hello).unwrap();
    let res = Dispatcher::new(router).dispatch(CanonicalRequest::new(Method::GET, "/events/"));
    assert_eq!(res.status, 404);
}

#[test]
fn test_unclassified_error_production_body() {
    let mut router = Router::new();
    router.get("/fails", fails).unwrap();
    let res = Dispatcher::new(router).dispatch(get("/fails"));

    assert_eq!(res.status, 500);
    assert_eq!(body_json(&res), json!({"error_message": "Internal server error."}));
}

#[test]
fn test_unclassified_error_debug_body() {
    let mut router = Router::new();
    router.get("/fails", fails).unwrap();
    let dispatcher = Dispatcher::new(router).with_debug(true);
    assert!(dispatcher.debug());

    let res = dispatcher.dispatch(get("/fails"));
    assert_eq!(res.status, 500);
    let body = body_json(&res);
    assert_eq!(body["error_message"], "something went very wrong");
    assert!(!body["trace"].as_str().unwrap().is_empty());
}

#[test]
fn test_handler_panic_becomes_500() {
    let mut router = Router::new();
    router.get("/panics", panics).unwrap();
    router.get("/hello", hello).unwrap();
    let dispatcher = Dispatcher::new(router).with_debug(true);

    let res = dispatcher.dispatch(get("/panics"));
    assert_eq!(res.status, 500);
    assert!(body_json(&res)["error_message"]
        .as_str()
        .unwrap()
        .contains("handler blew up"));

    // dispatcher still usable afterwards
    assert_eq!(dispatcher.dispatch(get("/hello")).status, 200);
}

#[test]
fn test_application_error_keeps_its_status() {
    let mut router = Router::new();
    router.post("/bikes", bad_request).unwrap();
    router
        .get("/teapot", |_| -> anyhow::Result<Value> {
            Err(ApplicationError::with_status("short and stout", StatusCode::IM_A_TEAPOT).into())
        })
        .unwrap();
    let dispatcher = Dispatcher::new(router);

    let res = dispatcher.dispatch(CanonicalRequest::new(Method::POST, "/bikes").with_resource("/bikes"));
    assert_eq!(res.status, 400);
    assert_eq!(
        body_json(&res),
        json!({"error_message": "BadRequestError: The field 'name' is required."})
    );

    let res = dispatcher.dispatch(get("/teapot"));
    assert_eq!(res.status, 418);
}

#[test]
fn test_handler_can_return_route_error() {
    let mut router = Router::new();
    router
        .get("/pets/{id}", |inv| -> anyhow::Result<Value> {
            Err(RouteError::NotFound {
                resource: inv.request.resource.clone(),
            }
            .into())
        })
        .unwrap();
    let res = Dispatcher::new(router).dispatch(get("/pets/{id}").with_path_param("id", "1"));
    assert_eq!(res.status, 404);
}

#[test]
fn test_custom_response_with_status_and_content_type() {
    let mut router = Router::new();
    router
        .get("/page", |_| {
            Ok(Response::json(206, json!("<h1>Partial</h1>")).with_header("Content-Type", "text/html"))
        })
        .unwrap();
    let res = Dispatcher::new(router).dispatch(get("/page"));

    assert_eq!(res.status, 206);
    assert_eq!(res.get_header("content-type"), Some("text/html"));
    assert_eq!(res.headers.len(), 1);
    // non-JSON content types are not transformed
    assert_eq!(res.body, Body::Value(json!("<h1>Partial</h1>")));
}

#[test]
fn test_ambient_response_mutation_keeps_returned_body() {
    let mut router = Router::new();
    router
        .post("/items", |inv| {
            inv.response.status = 201;
            inv.response.set_header("Location", "/items/1");
            Ok(json!({"id": 1}))
        })
        .unwrap();
    let res = Dispatcher::new(router).dispatch(CanonicalRequest::new(Method::POST, "/items").with_resource("/items"));

    assert_eq!(res.status, 201);
    assert_eq!(res.get_header("location"), Some("/items/1"));
    assert_eq!(body_json(&res), json!({"id": 1}));
}

#[test]
fn test_handler_reads_json_body() {
    let mut router = Router::new();
    router
        .post("/bikes", |inv| {
            let name = inv
                .request
                .json_body()?
                .and_then(|b| b.get("name"))
                .and_then(Value::as_str)
                .ok_or_else(|| ApplicationError::bad_request("name is required"))?
                .to_string();
            Ok(json!({ "name": name }))
        })
        .unwrap();
    let dispatcher = Dispatcher::new(router);
    let post = |body: &str| {
        CanonicalRequest::new(Method::POST, "/bikes")
            .with_resource("/bikes")
            .with_header("Content-Type", "application/json")
            .with_body(body)
    };

    assert_eq!(body_json(&dispatcher.dispatch(post(r#"{"name": "scott"}"#))), json!({"name": "scott"}));
    assert_eq!(dispatcher.dispatch(post("{}")).status, 400);
    assert_eq!(dispatcher.dispatch(post("{oops")).status, 400);
}

#[test]
fn test_string_reply_is_json_string_by_default() {
    let mut router = Router::new();
    router.get("/text", |_| Ok("plain")).unwrap();
    let res = Dispatcher::new(router).dispatch(get("/text"));
    assert_eq!(res.body, Body::Encoded("\"plain\"".to_string()));
}

struct Greeter {
    greeting: String,
}

impl Handler for Greeter {
    fn handle(&self, inv: &mut Invocation) -> anyhow::Result<Reply> {
        let name = inv.params.str("name").unwrap_or("stranger");
        Ok(json!({ "greeting": format!("{} {name}", self.greeting) }).into())
    }
}

#[test]
fn test_struct_handlers_and_explicit_registration() {
    let mut router = Router::new();
    router
        .add_route(
            "/greet/{name}",
            [Method::GET],
            Arc::new(Greeter {
                greeting: "hola".into(),
            }),
            vec![ParamDecl::new("name", FieldType::token())],
        )
        .unwrap();
    router
        .add(RouteSpec::with_handler("/echo/{a}/{b}", handler_fn(echo_params)))
        .unwrap();
    let dispatcher = Dispatcher::new(router);

    let res = dispatcher.dispatch(get("/greet/{name}").with_path_param("name", "ana"));
    assert_eq!(body_json(&res), json!({"greeting": "hola ana"}));

    let res = dispatcher.dispatch(get("/greet/{name}").with_path_param("name", "a@b"));
    assert_eq!(res.status, 404);

    let res = dispatcher.dispatch(
        get("/echo/{a}/{b}")
            .with_path_param("a", "x")
            .with_path_param("b", "y"),
    );
    assert_eq!(body_json(&res), json!({"a": "x", "b": "y"}));
}

#[test]
fn test_concurrent_dispatch() {
    let dispatcher = Arc::new(articles_dispatcher());
    let threads: Vec<_> = (0..8)
        .map(|i| {
            let dispatcher = Arc::clone(&dispatcher);
            std::thread::spawn(move || {
                let res = dispatcher.dispatch(
                    get("/articles/{year}/{month}/")
                        .with_path_param("year", (2000 + i).to_string())
                        .with_path_param("month", "1"),
                );
                body_json(&res)["year"].as_i64()
            })
        })
        .collect();
    let mut years: Vec<i64> = threads.into_iter().map(|t| t.join().unwrap().unwrap()).collect();
    years.sort_unstable();
    assert_eq!(years, (2000..2008).collect::<Vec<_>>());
}
