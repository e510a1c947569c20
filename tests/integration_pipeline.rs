mod common;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use common::{LogCapture, TestApp, get, send, setup_test_app};
use financify::metrics::debug_router;
use financify::middleware::Authorize;
use financify::router::{init_app, with_request_timeout};
use financify::web::{
    App, BoxFuture, BoxHandler, Handler, HandlerResult, Middleware, Reply, RequestContext,
    ResponseSink, Scope, ShutdownHandle, ShutdownReason, TRACE_ID_HEADER, WebError, boxed,
    handler_fn,
};
use financify_auth::ROLE_ADMIN;
use futures::future::join_all;
use serde_json::json;
use tracing::info;

async fn explode(_state: (), _scope: Scope, _req: Request) -> Result<Reply, WebError> {
    panic!("index out of range: the len is 3 but the index is 7");
}

async fn read_claims(_state: (), scope: Scope, _req: Request) -> Result<Reply, WebError> {
    let claims = scope.claims()?;
    Reply::ok(&json!({ "sub": claims.sub }))
}

async fn stall(_state: (), _scope: Scope, _req: Request) -> Result<Reply, WebError> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Ok(Reply::no_content())
}

async fn marked(_state: (), scope: Scope, req: Request) -> Result<Reply, WebError> {
    let marker = req.uri().query().unwrap_or_default().to_string();
    tokio::task::yield_now().await;
    info!(marker = %marker, "handled");
    tokio::task::yield_now().await;
    Reply::ok(&json!({ "marker": marker, "trace_id": scope.trace_id }))
}

/// The application router with extra routes that misbehave on purpose.
fn router_with(app: &TestApp) -> axum::Router {
    let mut routes = init_app(&app.state, app.shutdown.clone()).unwrap();
    routes
        .handle(Method::GET, "/test/panic", handler_fn((), explode), &[])
        .unwrap();
    routes
        .handle(
            Method::GET,
            "/test/misconfigured",
            handler_fn((), read_claims),
            &[boxed(Authorize::any_of(&[ROLE_ADMIN]))],
        )
        .unwrap();
    routes
        .handle(
            Method::GET,
            "/test/unauthenticated",
            handler_fn((), read_claims),
            &[],
        )
        .unwrap();
    routes
        .handle(Method::GET, "/test/marked", handler_fn((), marked), &[])
        .unwrap();
    routes
        .handle(Method::GET, "/test/stall", handler_fn((), stall), &[])
        .unwrap();
    routes.into_router()
}

#[tokio::test]
async fn test_panic_becomes_generic_500() {
    let app = setup_test_app().await;
    let router = router_with(&app);
    let (logs, _guard) = LogCapture::install();

    let response = send(&router, get("/test/panic", None)).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json(), json!({ "error": "Internal Server Error" }));
    let body = String::from_utf8(response.body.clone()).unwrap();
    assert!(!body.contains("index out of range"));

    let trace_id = response
        .headers
        .get(TRACE_ID_HEADER)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let recovered = logs.find("Recovered from panic");
    assert_eq!(recovered.len(), 1);
    let fields = &recovered[0]["fields"];
    assert_eq!(fields["trace_id"], trace_id.as_str());
    assert!(
        fields["error"]
            .as_str()
            .unwrap()
            .starts_with("panic: index out of range")
    );
    assert!(!fields["backtrace"].as_str().unwrap().is_empty());

    let completed = logs.find("completed");
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0]["level"], "ERROR");
    assert_eq!(completed[0]["fields"]["status"], 500);
    assert_eq!(completed[0]["span"]["trace_id"], trace_id.as_str());

    let snapshot = app.state.metrics.snapshot();
    assert_eq!(snapshot.requests, 1);
    assert_eq!(snapshot.errors, 1);
    assert_eq!(snapshot.in_flight, 0);
    assert!(!app.shutdown.is_triggered());
}

#[tokio::test]
async fn test_server_keeps_serving_after_panic() {
    let app = setup_test_app().await;
    let router = router_with(&app);

    let response = send(&router, get("/test/panic", None)).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);

    let response = send(&router, get("/v1/liveness", None)).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_authorize_without_authenticate_shuts_down() {
    let app = setup_test_app().await;
    let router = router_with(&app);

    let response = send(&router, get("/test/misconfigured", None)).await;

    // A structural fault is never reported as a 403.
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.error_message(), "Internal Server Error");
    assert_eq!(
        app.shutdown.reason(),
        Some(ShutdownReason::Fault(
            "claims missing from request context".to_string()
        ))
    );
}

#[tokio::test]
async fn test_handler_reading_missing_claims_shuts_down() {
    let app = setup_test_app().await;
    let router = router_with(&app);

    let response = send(&router, get("/test/unauthenticated", None)).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(matches!(
        app.shutdown.reason(),
        Some(ShutdownReason::Fault(_))
    ));
}

#[tokio::test]
async fn test_request_log_carries_concrete_path() {
    let app = setup_test_app().await;
    let (logs, _guard) = LogCapture::install();
    let token = app.admin_token();
    let uri = format!("/v1/users/{}", app.user.id);

    let response = app.send(get(&uri, Some(&token))).await;
    assert_eq!(response.status, StatusCode::OK);

    for message in ["started", "completed"] {
        let events = logs.find(message);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["fields"]["path"], uri.as_str());
        assert_eq!(events[0]["fields"]["method"], "GET");
    }
}

#[tokio::test]
async fn test_concurrent_requests_keep_their_own_trace_id() {
    let app = setup_test_app().await;
    let router = router_with(&app);
    let (logs, _guard) = LogCapture::install();

    let responses = join_all(
        (0..16).map(|n| send(&router, get(&format!("/test/marked?{n}"), None))),
    )
    .await;

    let mut seen = HashSet::new();
    let handled = logs.find("handled");
    assert_eq!(handled.len(), 16);
    for response in responses {
        assert_eq!(response.status, StatusCode::OK);
        let body = response.json();
        let header = response
            .headers
            .get(TRACE_ID_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(body["trace_id"], header.as_str());
        assert!(seen.insert(header.clone()));

        let event = handled
            .iter()
            .find(|e| e["fields"]["marker"] == body["marker"])
            .unwrap();
        assert_eq!(event["span"]["trace_id"], header.as_str());
    }
}

#[tokio::test]
async fn test_slow_request_times_out_with_408() {
    let app = setup_test_app().await;
    let router = with_request_timeout(router_with(&app), Duration::from_millis(50));

    let response = tokio::time::timeout(
        Duration::from_secs(2),
        send(&router, get("/test/stall", None)),
    )
    .await
    .unwrap();
    assert_eq!(response.status, StatusCode::REQUEST_TIMEOUT);

    let response = send(&router, get("/v1/liveness", None)).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_client_errors_are_counted() {
    let app = setup_test_app().await;

    let response = app.send(get("/v1/users", None)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    let response = app.send(get("/v1/liveness", None)).await;
    assert_eq!(response.status, StatusCode::OK);

    let snapshot = app.state.metrics.snapshot();
    assert_eq!(snapshot.requests, 2);
    assert_eq!(snapshot.errors, 1);
    assert_eq!(snapshot.in_flight, 0);
}

#[tokio::test]
async fn test_debug_vars_reports_counters() {
    let app = setup_test_app().await;
    app.send(get("/v1/liveness", None)).await;

    let debug = debug_router(app.state.metrics.clone(), None);
    let response = send(
        &debug,
        axum::http::Request::builder()
            .uri("/debug/vars")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["requests"], 1);
    assert_eq!(body["errors"], 0);
    assert!(body["build"].is_string());
}

#[tokio::test]
async fn test_liveness_needs_no_token() {
    let app = setup_test_app().await;

    let response = app.send(get("/v1/liveness", None)).await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["status"], "up");
    assert!(body["host"].is_string());
}

#[tokio::test]
async fn test_readiness_follows_store_health() {
    let app = setup_test_app().await;

    let response = app.send(get("/v1/readiness", None)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({ "status": "ok" }));

    app.store.set_healthy(false);
    let response = app.send(get("/v1/readiness", None)).await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.error_message(), "db not ready");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = setup_test_app().await;

    let response = app.send(get("/v1/nothing-here", None)).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

struct Record {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

struct RecordHandler {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
    inner: BoxHandler,
}

impl Middleware for Record {
    fn name(&self) -> &'static str {
        self.name
    }

    fn wrap(&self, inner: BoxHandler) -> BoxHandler {
        Arc::new(RecordHandler {
            name: self.name,
            log: self.log.clone(),
            inner,
        })
    }
}

impl Handler for RecordHandler {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        sink: &'a mut ResponseSink,
        req: Request,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            self.log.lock().unwrap().push(format!("enter {}", self.name));
            let result = self.inner.call(ctx, sink, req).await;
            self.log.lock().unwrap().push(format!("exit {}", self.name));
            result
        })
    }
}

#[tokio::test]
async fn test_app_middlewares_wrap_route_middlewares() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let record = |name| {
        boxed(Record {
            name,
            log: log.clone(),
        })
    };

    let mut app = App::new(ShutdownHandle::new(), vec![record("outer"), record("inner")]);
    app.handle(
        Method::GET,
        "/ordered",
        handler_fn((), |_: (), _: Scope, _: Request| async { Ok::<_, WebError>(Reply::no_content()) }),
        &[record("route")],
    )
    .unwrap();
    let router = app.into_router();

    let response = send(&router, get("/ordered", None)).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "enter outer",
            "enter inner",
            "enter route",
            "exit route",
            "exit inner",
            "exit outer",
        ]
    );
}

#[tokio::test]
async fn test_duplicate_route_is_rejected() {
    let mut app = App::new(ShutdownHandle::new(), Vec::new());
    let handler = || handler_fn((), |_: (), _: Scope, _: Request| async { Ok::<_, WebError>(Reply::no_content()) });

    app.handle(Method::GET, "/twice", handler(), &[]).unwrap();
    assert!(app.handle(Method::GET, "/twice", handler(), &[]).is_err());
    app.handle(Method::POST, "/twice", handler(), &[]).unwrap();
}
