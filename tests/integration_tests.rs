//! Integration tests using wiremock to simulate HTTP servers.

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use veneer::{
    Arg, Capability, Decoded, Error, ErrorDecoder, ExponentialBackoff, InterfaceDef,
    InvocationContext, MethodDef, NeverRetry, Options, ParamDef, PropagationPolicy, Response,
    ResponseBody, Retryer, ReturnType, Veneer,
};
use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: u64,
    name: String,
}

/// `Eg` with a class header and one templated GET, the shape most tests start from.
fn eg(return_type: ReturnType) -> InterfaceDef {
    InterfaceDef::new("Eg").headers(["Accept: */*"]).method(
        MethodDef::new("get")
            .request_line("GET /x?a={a}")
            .returns(return_type)
            .param(ParamDef::new("a", "String").bind("a")),
    )
}

#[tokio::test]
async fn default_header_and_get_template() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/x"))
        .and(query_param("a", "1"))
        .and(header("Accept", "*/*"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let api = Veneer::builder()
        .target(eg(ReturnType::Response), &server.uri())
        .unwrap();

    let response = api.invoke_response("get", vec![Arg::from("1")]).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text(), "ok");
}

#[tokio::test]
async fn retry_then_success() {
    let server = MockServer::start().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();

    // Two 503s, then a 200 carrying "ok".
    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(move |_req: &wiremock::Request| {
            if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                ResponseTemplate::new(503).set_body_string("busy")
            } else {
                ResponseTemplate::new(200).set_body_json("ok")
            }
        })
        .mount(&server)
        .await;

    let api = Veneer::builder()
        .retryer(ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_secs(1),
            3,
        ))
        .target(eg(ReturnType::named("String")), &server.uri())
        .unwrap();

    let start = Instant::now();
    let body: String = api.invoke("get", vec![Arg::from("1")]).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(body, "ok");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    // Backoff slept 100 ms then 150 ms before the attempts that followed.
    assert!(elapsed >= Duration::from_millis(250), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn retry_exhaustion_propagates_latest_error() {
    let server = MockServer::start().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();

    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(move |_req: &wiremock::Request| {
            seen.fetch_add(1, Ordering::SeqCst);
            ResponseTemplate::new(503).set_body_string("busy")
        })
        .mount(&server)
        .await;

    let api = Veneer::builder()
        .retryer(ExponentialBackoff::new(
            Duration::from_millis(10),
            Duration::from_millis(50),
            3,
        ))
        .target(eg(ReturnType::named("String")), &server.uri())
        .unwrap();

    let err = api
        .invoke::<String>("get", vec![Arg::from("1")])
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(err.status().map(|s| s.as_u16()), Some(503));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn unwrap_policy_surfaces_the_cause() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let api = Veneer::builder()
        .retryer(NeverRetry)
        .propagation_policy(PropagationPolicy::Unwrap)
        .target(eg(ReturnType::named("String")), &server.uri())
        .unwrap();

    let err = api
        .invoke::<String>("get", vec![Arg::from("1")])
        .await
        .unwrap_err();

    match err {
        Error::Status { status, raw_body, .. } => {
            assert_eq!(status.as_u16(), 503);
            assert_eq!(raw_body, "busy");
        }
        other => panic!("expected the unwrapped status error, got {other:?}"),
    }
}

/// An error decoder that always asks for a retry far in the future; the retryer's
/// ceiling has to clamp the wait.
struct RetryWayLater;

impl ErrorDecoder for RetryWayLater {
    fn decode(&self, config_key: &str, response: &Response) -> Error {
        Error::Retryable(veneer::RetryableError {
            method: http::Method::GET,
            retry_after: Some(SystemTime::now() + Duration::from_secs(10)),
            cause: Box::new(Error::Status {
                config_key: config_key.to_string(),
                status: response.status(),
                raw_body: response.text(),
                headers: response.headers().clone(),
            }),
        })
    }
}

#[tokio::test]
async fn retry_after_is_clamped_by_max_period() {
    let server = MockServer::start().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();

    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(move |_req: &wiremock::Request| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(503)
            } else {
                ResponseTemplate::new(200).set_body_json("ok")
            }
        })
        .mount(&server)
        .await;

    let api = Veneer::builder()
        .error_decoder(RetryWayLater)
        .retryer(ExponentialBackoff::new(
            Duration::from_millis(10),
            Duration::from_millis(300),
            3,
        ))
        .target(eg(ReturnType::named("String")), &server.uri())
        .unwrap();

    let start = Instant::now();
    let body: String = api.invoke("get", vec![Arg::from("1")]).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(body, "ok");
    // Asked to wait 10 s; the 300 ms ceiling won.
    assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();

    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(move |_req: &wiremock::Request| {
            seen.fetch_add(1, Ordering::SeqCst);
            ResponseTemplate::new(400).set_body_string("bad request")
        })
        .mount(&server)
        .await;

    let api = Veneer::builder()
        .target(eg(ReturnType::named("String")), &server.uri())
        .unwrap();

    let err = api
        .invoke::<String>("get", vec![Arg::from("1")])
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(err.raw_body(), Some("bad request"));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn post_body_is_json_encoded() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({"name": "alice"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1, "name": "alice"})))
        .expect(1)
        .mount(&server)
        .await;

    let iface = InterfaceDef::new("Users").method(
        MethodDef::new("create")
            .request_line("POST /users")
            .returns(ReturnType::named("User"))
            .param(ParamDef::new("user", "User")),
    );
    let api = Veneer::builder().target(iface, &server.uri()).unwrap();

    let user: User = api
        .invoke("create", vec![Arg::from(json!({"name": "alice"}))])
        .await
        .unwrap();
    assert_eq!(user, User { id: 1, name: "alice".to_string() });
}

#[tokio::test]
async fn unreferenced_params_form_encode() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/session"))
        .and(header("Content-Type", "application/x-www-form-urlencoded"))
        .and(body_string("user=bob&password=hunter2"))
        .respond_with(ResponseTemplate::new(200).set_body_json("welcome"))
        .expect(1)
        .mount(&server)
        .await;

    let iface = InterfaceDef::new("Session").method(
        MethodDef::new("login")
            .request_line("POST /session")
            .returns(ReturnType::named("String"))
            .param(ParamDef::new("user", "String").bind("user"))
            .param(ParamDef::new("password", "String").bind("password")),
    );
    let api = Veneer::builder().target(iface, &server.uri()).unwrap();

    let body: String = api
        .invoke("login", vec![Arg::from("bob"), Arg::from("hunter2")])
        .await
        .unwrap();
    assert_eq!(body, "welcome");
}

#[tokio::test]
async fn query_and_header_maps_fold_into_the_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "rust"))
        .and(query_param("page", "2"))
        .and(header("X-Tenant", "acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let iface = InterfaceDef::new("Search").method(
        MethodDef::new("search")
            .request_line("GET /search?q={q}")
            .returns(ReturnType::named("Vec<Value>"))
            .param(ParamDef::new("q", "String").bind("q"))
            .param(ParamDef::new("extra", "Map<String,String>").query_map())
            .param(ParamDef::new("meta", "Map<String,String>").header_map()),
    );
    let api = Veneer::builder().target(iface, &server.uri()).unwrap();

    let hits: Vec<Value> = api
        .invoke(
            "search",
            vec![
                Arg::from("rust"),
                Arg::from(json!({"page": 2})),
                Arg::from(json!({"X-Tenant": "acme"})),
            ],
        )
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn url_argument_redirects_to_another_host() {
    let home = MockServer::start().await;
    let other = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(ResponseTemplate::new(200).set_body_json("elsewhere"))
        .expect(1)
        .mount(&other)
        .await;

    let iface = InterfaceDef::new("Roaming").method(
        MethodDef::new("get")
            .request_line("GET /x")
            .returns(ReturnType::named("String"))
            .param(ParamDef::url()),
    );
    let api = Veneer::builder().target(iface, &home.uri()).unwrap();

    let body: String = api
        .invoke("get", vec![Arg::from(other.uri())])
        .await
        .unwrap();
    assert_eq!(body, "elsewhere");
    assert!(home.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn dismissed_404_reads_as_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such user"))
        .mount(&server)
        .await;

    let api = Veneer::builder()
        .dismiss_404()
        .target(eg(ReturnType::named("Option<User>")), &server.uri())
        .unwrap();

    let user: Option<User> = api.invoke("get", vec![Arg::from("1")]).await.unwrap();
    assert_eq!(user, None);
}

#[tokio::test]
async fn decode_failure_preserves_raw_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(ResponseTemplate::new(200).set_body_string("plainly not json"))
        .mount(&server)
        .await;

    let api = Veneer::builder()
        .target(eg(ReturnType::named("User")), &server.uri())
        .unwrap();

    match api.invoke::<User>("get", vec![Arg::from("1")]).await {
        Err(Error::Decode { raw_body, config_key, .. }) => {
            assert_eq!(raw_body, "plainly not json");
            assert_eq!(config_key, "Eg#get(String)");
        }
        other => panic!("expected a decode error, got {other:?}"),
    }
}

#[tokio::test]
async fn request_interceptors_run_in_registration_order() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/x"))
        .and(header("X-Auth", "second"))
        .and(header("X-Stamp", "present"))
        .respond_with(ResponseTemplate::new(200).set_body_json("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let api = Veneer::builder()
        .request_interceptor(|template: &mut veneer::RequestTemplate| {
            template.header("X-Auth", ["first".to_string()]);
            template.header("X-Stamp", ["present".to_string()]);
        })
        .request_interceptor(|template: &mut veneer::RequestTemplate| {
            template.header("X-Auth", ["second".to_string()]);
        })
        .target(eg(ReturnType::named("String")), &server.uri())
        .unwrap();

    let body: String = api.invoke("get", vec![Arg::from("1")]).await.unwrap();
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn response_interceptor_replaces_the_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(ResponseTemplate::new(200).set_body_json("original"))
        .mount(&server)
        .await;

    fn rewrite(_: &InvocationContext, mut response: Response) -> veneer::Result<Response> {
        response.replace_body(Some(ResponseBody::new(b"\"rewritten\"".to_vec(), None)));
        Ok(response)
    }

    let api = Veneer::builder()
        .response_interceptor(rewrite as fn(&InvocationContext, Response) -> veneer::Result<Response>)
        .target(eg(ReturnType::named("String")), &server.uri())
        .unwrap();

    let body: String = api.invoke("get", vec![Arg::from("1")]).await.unwrap();
    assert_eq!(body, "rewritten");
}

/// Swaps the retry policy out at build time.
struct DisableRetries;

impl Capability for DisableRetries {
    fn enrich_retryer(&self, _retryer: Arc<dyn Retryer>) -> Arc<dyn Retryer> {
        Arc::new(NeverRetry)
    }
}

#[tokio::test]
async fn capabilities_wrap_installed_components() {
    let server = MockServer::start().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();

    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(move |_req: &wiremock::Request| {
            seen.fetch_add(1, Ordering::SeqCst);
            ResponseTemplate::new(503)
        })
        .mount(&server)
        .await;

    let api = Veneer::builder()
        .retryer(ExponentialBackoff::new(
            Duration::from_millis(10),
            Duration::from_millis(50),
            5,
        ))
        .capability(DisableRetries)
        .target(eg(ReturnType::named("String")), &server.uri())
        .unwrap();

    let err = api
        .invoke::<String>("get", vec![Arg::from("1")])
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn per_call_options_override_the_default() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json("late")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let iface = InterfaceDef::new("Slow").method(
        MethodDef::new("get")
            .request_line("GET /slow")
            .returns(ReturnType::named("String"))
            .param(ParamDef::options()),
    );
    let api = Veneer::builder()
        .retryer(NeverRetry)
        .target(iface, &server.uri())
        .unwrap();

    let tight = Options::new(Duration::from_secs(1), Duration::from_millis(50), true);
    let err = api
        .invoke::<String>("get", vec![Arg::from(tight)])
        .await
        .unwrap_err();
    // The timeout comes back as a transport failure, already wrapped for the retryer.
    assert!(err.is_retryable());
}

#[tokio::test]
async fn default_method_runs_locally_and_calls_through_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/x"))
        .and(query_param("a", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json("pong"))
        .expect(1)
        .mount(&server)
        .await;

    let iface = InterfaceDef::new("Eg")
        .method(
            MethodDef::new("get")
                .request_line("GET /x?a={a}")
                .returns(ReturnType::named("String"))
                .param(ParamDef::new("a", "String").bind("a")),
        )
        .method(MethodDef::new("summary").default_impl(|api, _args| async move {
            let body: String = api.invoke("get", vec![Arg::from("1")]).await?;
            Ok(Decoded::Value(Value::String(format!("summary: {body}"))))
        }));

    let api = Veneer::builder().target(iface, &server.uri()).unwrap();

    let summary: String = api.invoke("summary", vec![]).await.unwrap();
    assert_eq!(summary, "summary: pong");
}

#[tokio::test]
async fn form_params_cannot_mix_with_a_body() {
    let iface = InterfaceDef::new("Eg").method(
        MethodDef::new("post")
            .request_line("POST /x")
            .param(ParamDef::new("q", "String").bind("q"))
            .param(ParamDef::new("payload", "User")),
    );

    let err = Veneer::builder().target(iface, "http://h").unwrap_err();
    match err {
        Error::Configuration(message) => {
            assert!(
                message.contains("cannot mix form parameters with body parameter"),
                "{message}"
            );
        }
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_and_ignored_operations_fail_to_dispatch() {
    let iface = eg(ReturnType::named("String")).method(MethodDef::new("legacy").ignored());
    let api = Veneer::builder().target(iface, "http://h").unwrap();

    match api.invoke::<String>("nope", vec![]).await.unwrap_err() {
        Error::UnknownMethod { method, .. } => assert_eq!(method, "nope"),
        other => panic!("expected unknown-method, got {other:?}"),
    }

    match api.invoke::<String>("legacy", vec![]).await.unwrap_err() {
        Error::Configuration(message) => assert!(message.contains("Eg#legacy()"), "{message}"),
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

#[tokio::test]
async fn templates_expose_metadata_and_target_to_interceptors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(ResponseTemplate::new(200).set_body_json("ok"))
        .mount(&server)
        .await;

    let api = Veneer::builder()
        .request_interceptor(|template: &mut veneer::RequestTemplate| {
            let metadata = template.method_metadata().expect("metadata attached");
            assert_eq!(metadata.config_key(), "Eg#get(String)");
            let target = template.target().expect("target attached");
            assert_eq!(target.iface().name(), "Eg");
        })
        .target(eg(ReturnType::named("String")), &server.uri())
        .unwrap();

    let _: String = api.invoke("get", vec![Arg::from("1")]).await.unwrap();
}

#[tokio::test]
async fn api_identity_comes_from_the_target() {
    let iface = || eg(ReturnType::named("String"));
    let engine = Veneer::builder().build().unwrap();
    let a = engine
        .new_instance(veneer::Target::new(iface(), "http://h").unwrap())
        .unwrap();
    let b = engine
        .new_instance(veneer::Target::new(iface(), "http://h").unwrap())
        .unwrap();
    let c = engine
        .new_instance(veneer::Target::new(iface(), "http://other").unwrap())
        .unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.to_string(), "Target(type=Eg, name=http://h, url=http://h)");
}
