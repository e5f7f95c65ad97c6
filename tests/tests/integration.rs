use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use fngate_gateway::client_context::{ACTIVE_PROFILES_KEY, ClientContext, LOCALE_KEY};
use fngate_gateway::server::GatewayServer;
use fngate_gateway::settings::{ClientContextSettings, GatewaySettings, RouteSettings};
use fngate_kernel::gateway::{FallbackCause, FallbackProvider, InvokeResult};
use fngate_resilience::{
    CircuitBreakerConfig, CircuitBreakerSettings, FallbackRegistry, IsolationPolicyOverride,
    IsolationSettings,
};
use fngate_testing::{EchoTransport, MockReply, MockTransport, StaticFallback, assert_invoked};
use serde_json::{Value, json};
use tower::ServiceExt;

const HELLO: &str = "arn:aws:lambda:us-east-1:123456789012:function:hello";

fn settings() -> GatewaySettings {
    GatewaySettings {
        client_context: ClientContextSettings {
            active_profiles: vec!["prod".into(), "aws".into()],
            locale: Some("ko_KR".into()),
        },
        routes: vec![RouteSettings {
            path_prefix: "/hello".into(),
            route_key: HELLO.into(),
        }],
        ..Default::default()
    }
}

fn app(settings: GatewaySettings, transport: MockTransport) -> Router {
    GatewayServer::new(settings)
        .build_app(Arc::new(transport))
        .unwrap()
}

fn app_with_fallback(
    settings: GatewaySettings,
    transport: MockTransport,
    fallback: &StaticFallback,
) -> Router {
    let provider: Arc<dyn FallbackProvider> = Arc::new(fallback.clone());
    let fallbacks = FallbackRegistry::from_providers([provider]).unwrap();
    GatewayServer::new(settings)
        .with_fallbacks(fallbacks)
        .build_app(Arc::new(transport))
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn form_body_overrides_query_in_payload() {
    let echo = EchoTransport::default();
    let app = GatewayServer::new(settings())
        .build_app(Arc::new(echo.clone()))
        .unwrap();

    let response = app
        .oneshot(
            Request::post("/hello?say=hello&to=arawn&flag")
                .header("content-type", "application/x-www-form-urlencoded; charset=UTF-8")
                .body(Body::from("to=minchan&to=jisoo&note="))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "say": "hello",
            "to": ["minchan", "jisoo"],
            "flag": null,
            "note": "",
        })
    );
    assert_eq!(echo.last_request().unwrap().function_name, HELLO);
}

#[tokio::test]
async fn json_body_is_forwarded_unchanged() {
    let transport = MockTransport::new();
    let response = app(settings(), transport.clone())
        .oneshot(
            Request::put("/hello/items?ignored=1")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"id":7,"tags":["a"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let request = transport.last_request().unwrap();
    assert_eq!(
        request.payload.unwrap().as_ref(),
        br#"{"id":7,"tags":["a"]}"#
    );
}

#[tokio::test]
async fn client_context_carries_profiles_and_locale() {
    let transport = MockTransport::new();
    let response = app(settings(), transport.clone())
        .oneshot(get("/hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = transport.last_request().unwrap();
    let context = ClientContext::decode(request.client_context.as_deref().unwrap()).unwrap();
    assert_eq!(context.environment[ACTIVE_PROFILES_KEY], "prod,aws");
    assert_eq!(context.environment[LOCALE_KEY], "ko_KR");
    assert!(context.client.is_empty());
    assert!(context.custom.is_empty());
}

#[tokio::test]
async fn caller_request_id_is_forwarded_and_echoed() {
    let transport = MockTransport::new();
    let response = app(settings(), transport.clone())
        .oneshot(
            Request::get("/hello")
                .header("x-request-id", "caller-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "caller-1");
    let request = transport.last_request().unwrap();
    assert_eq!(request.headers["x-request-id"], "caller-1");
}

#[tokio::test]
async fn handled_function_error_keeps_its_status() {
    let transport = MockTransport::new();
    transport.push_result(
        InvokeResult::ok(r#"{"errorMessage":"missing"}"#)
            .with_status(404)
            .with_function_error("Handled"),
    );

    let response = app(settings(), transport).oneshot(get("/hello")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "FunctionError");
    assert!(json["error"]["message"].as_str().unwrap().contains("Handled"));
}

#[tokio::test]
async fn unhandled_function_error_becomes_500() {
    let transport = MockTransport::with_default(
        InvokeResult::ok(r#"{"errorMessage":"boom"}"#).with_function_error("Unhandled"),
    );

    let response = app(settings(), transport).oneshot(get("/hello")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"]["code"], "FunctionError");
}

#[tokio::test]
async fn service_failure_is_an_invoke_error() {
    let transport = MockTransport::new();
    transport.push(MockReply::ServiceError(429, "Rate exceeded".into()));

    let response = app(settings(), transport).oneshot(get("/hello")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"]["code"], "FunctionInvokeError");
}

#[tokio::test]
async fn invalid_content_type_never_reaches_the_transport() {
    let transport = MockTransport::new();
    let response = app(settings(), transport.clone())
        .oneshot(
            Request::post("/hello")
                .header("content-type", "not a media type")
                .body(Body::from("x"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"]["code"], "FunctionInvokeError");
    assert_invoked!(transport, 0);
}

#[tokio::test]
async fn slow_function_times_out() {
    let mut settings = settings();
    settings.isolation = IsolationSettings::default()
        .with_default(IsolationPolicyOverride::default().with_timeout(Duration::from_millis(50)));
    let transport = MockTransport::new();
    transport.set_delay(Duration::from_millis(500));

    let response = app(settings, transport).oneshot(get("/hello")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"]["code"], "InvocationTimeout");
}

#[tokio::test]
async fn timeout_is_served_by_fallback() {
    let mut settings = settings();
    settings.isolation = IsolationSettings::default()
        .with_default(IsolationPolicyOverride::default().with_timeout(Duration::from_millis(50)));
    let transport = MockTransport::new();
    transport.set_delay(Duration::from_millis(500));
    let fallback = StaticFallback::new(HELLO, 200, r#"{"cached":true}"#);

    let response = app_with_fallback(settings, transport, &fallback)
        .oneshot(get("/hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-fallback-cause"], "timeout");
    assert_eq!(body_json(response).await, json!({"cached": true}));
    assert_eq!(fallback.causes(), vec![FallbackCause::Timeout]);
}

#[tokio::test]
async fn error_status_fallback_is_still_a_function_error() {
    let transport = MockTransport::new();
    transport.push_network_error("connection refused");
    let fallback = StaticFallback::new(HELLO, 503, r#"{"degraded":true}"#);

    let response = app_with_fallback(settings(), transport, &fallback)
        .oneshot(get("/hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"]["code"], "FunctionError");
    assert_eq!(fallback.causes().len(), 1);
}

#[tokio::test]
async fn repeated_failures_open_the_circuit() {
    let mut settings = settings();
    settings.circuit_breaker = CircuitBreakerSettings::default().with_default_config(
        CircuitBreakerConfig::default()
            .with_request_volume_threshold(2)
            .with_sleep_window(Duration::from_secs(60)),
    );
    let transport = MockTransport::new();
    transport
        .push_network_error("down")
        .push_network_error("down");
    let app = app(settings, transport.clone());

    for _ in 0..2 {
        let response = app.clone().oneshot(get("/hello")).await.unwrap();
        assert_eq!(body_json(response).await["error"]["code"], "FunctionInvokeError");
    }

    let response = app.clone().oneshot(get("/hello")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"]["code"], "CircuitOpen");
    assert_invoked!(transport, 2);

    let groups = body_json(app.oneshot(get("/v1/isolation-groups")).await.unwrap()).await;
    assert_eq!(groups["groups"][0]["key"], HELLO);
    assert_eq!(groups["groups"][0]["state"], "open");
}

#[tokio::test]
async fn saturated_group_rejects_extra_calls() {
    let mut settings = settings();
    settings.isolation = IsolationSettings::default().with_default(
        IsolationPolicyOverride::default()
            .with_timeout(Duration::from_secs(5))
            .with_max_concurrent(1),
    );
    let transport = MockTransport::new();
    transport.set_delay(Duration::from_millis(200));
    let app = app(settings, transport);

    let (first, second) = tokio::join!(
        app.clone().oneshot(get("/hello?n=1")),
        app.clone().oneshot(get("/hello?n=2")),
    );
    let mut statuses = [first.unwrap().status(), second.unwrap().status()];
    statuses.sort();

    assert_eq!(statuses, [StatusCode::OK, StatusCode::SERVICE_UNAVAILABLE]);
}

#[tokio::test]
async fn non_function_routes_are_left_alone() {
    let mut settings = settings();
    settings.routes.push(RouteSettings {
        path_prefix: "/users".into(),
        route_key: "users-service".into(),
    });
    let transport = MockTransport::new();

    let response = app(settings, transport.clone())
        .oneshot(get("/users/42"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_invoked!(transport, 0);
}
