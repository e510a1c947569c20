#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use chrono::{Duration, Utc};
use financify::logging::json_layer;
use financify::modules::users::memory::InMemoryUserStore;
use financify::modules::users::{NewUser, User, UserStore};
use financify::router::init_router;
use financify::state::AppState;
use financify::web::ShutdownHandle;
use financify_auth::{
    Authenticator, Claims, KeyRegistry, ROLE_ADMIN, ROLE_USER, generate_signing_key,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;

pub const TEST_KID: &str = "test-kid";
pub const TEST_ISSUER: &str = "financify service";
pub const TEST_PASSWORD: &str = "gophers";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryUserStore>,
    pub shutdown: ShutdownHandle,
    pub admin: User,
    pub user: User,
}

impl TestApp {
    /// Token for `user` signed with the active key.
    pub fn token_for(&self, user: &User) -> String {
        let claims = self
            .state
            .auth
            .claims_for(user.id.to_string(), user.roles.clone(), Utc::now());
        self.state.auth.issue_active(&claims).unwrap()
    }

    pub fn admin_token(&self) -> String {
        self.token_for(&self.admin)
    }

    pub fn user_token(&self) -> String {
        self.token_for(&self.user)
    }

    /// A correctly signed token whose lifetime ended an hour ago.
    pub fn expired_token(&self, user: &User) -> String {
        let now = Utc::now();
        let claims = Claims::new(
            TEST_ISSUER,
            user.id.to_string(),
            user.roles.clone(),
            now - Duration::hours(2),
            now - Duration::hours(1),
        );
        self.state.auth.issue(TEST_KID, &claims).unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        send(&self.router, request).await
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap().to_string()
    }
}

pub fn test_authenticator() -> Authenticator {
    let mut keys = KeyRegistry::builder();
    keys.insert(TEST_KID, &generate_signing_key()).unwrap();
    keys.active(TEST_KID);
    Authenticator::new(keys.build().unwrap(), TEST_ISSUER, 3600)
}

pub fn new_user(name: &str, email: &str, roles: &[&str]) -> NewUser {
    NewUser {
        name: name.to_string(),
        email: email.to_string(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        password: TEST_PASSWORD.to_string(),
        password_confirm: TEST_PASSWORD.to_string(),
    }
}

/// In-memory application with one admin and one regular user.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(test_authenticator()).await
}

pub async fn setup_test_app_with(auth: Authenticator) -> TestApp {
    let store = Arc::new(InMemoryUserStore::new());
    let admin = store
        .create(
            new_user("Admin Gopher", "admin@example.com", &[ROLE_ADMIN, ROLE_USER]),
            Utc::now(),
        )
        .await
        .unwrap();
    let user = store
        .create(new_user("User Gopher", "user@example.com", &[ROLE_USER]), Utc::now())
        .await
        .unwrap();

    let state = AppState::new(store.clone(), Arc::new(auth));
    let shutdown = ShutdownHandle::new();
    let router = init_router(&state, shutdown.clone()).unwrap();

    TestApp {
        router,
        state,
        store,
        shutdown,
        admin,
        user,
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec();

    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    build(uri, "GET", token, None)
}

pub fn delete(uri: &str, token: Option<&str>) -> Request<Body> {
    build(uri, "DELETE", token, None)
}

pub fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    build(uri, "POST", token, Some(body))
}

pub fn put_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    build(uri, "PUT", token, Some(body))
}

fn build(uri: &str, method: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// In-memory sink for JSON log lines.
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Routes this thread's events into the capture until the guard drops.
    ///
    /// Only valid with the current-thread runtime `#[tokio::test]` uses by
    /// default.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::registry().with(json_layer(capture.clone()));
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn events(&self) -> Vec<Value> {
        let buf = self.buf.lock().unwrap();
        String::from_utf8_lossy(&buf)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// Events whose message equals `message`.
    pub fn find(&self, message: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|event| event["fields"]["message"] == message)
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
