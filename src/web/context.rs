//! Request-scoped state threaded explicitly through the pipeline.
//!
//! A [`RequestContext`] is created by the router shell immediately before a
//! request enters the middleware chain and dropped once the response has
//! been written. It is owned by the single task serving that request and is
//! passed down as `&mut`, never shared.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::http::{Method, StatusCode};
use axum::response::Response;
use chrono::{DateTime, Utc};
use financify_auth::Claims;

use super::error::{StructuralFault, WebError};

#[derive(Debug)]
pub struct RequestContext {
    trace_id: String,
    now: DateTime<Utc>,
    started: Instant,
    method: Method,
    path: String,
    remote_addr: Option<SocketAddr>,
    params: HashMap<String, String>,
    status: Option<StatusCode>,
    claims: Option<Claims>,
}

impl RequestContext {
    pub fn new(
        trace_id: impl Into<String>,
        method: Method,
        path: impl Into<String>,
        remote_addr: Option<SocketAddr>,
        params: HashMap<String, String>,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            now: Utc::now(),
            started: Instant::now(),
            method,
            path: path.into(),
            remote_addr,
            params,
            status: None,
            claims: None,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Wall-clock time the request entered the pipeline.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path as requested, e.g. `/v1/users/5cf37266-...`. Captured segments
    /// are also available through [`param`](Self::param).
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Status written by the response translator, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Records the response status. Write-once.
    pub fn set_status(&mut self, status: StatusCode) -> Result<(), WebError> {
        if let Some(previous) = self.status {
            return Err(WebError::invariant(format!(
                "response status already set to {previous}, refusing {status}"
            )));
        }
        self.status = Some(status);
        Ok(())
    }

    /// Claims attached by `Authenticate`.
    ///
    /// Absence means the route was registered without `Authenticate` in
    /// front of whatever is asking, which is a structural fault rather than
    /// a 401 or 403.
    pub fn claims(&self) -> Result<&Claims, WebError> {
        self.claims
            .as_ref()
            .ok_or(WebError::Shutdown(StructuralFault::MissingClaims))
    }

    pub fn attach_claims(&mut self, claims: Claims) {
        self.claims = Some(claims);
    }

    /// Owned snapshot handed to terminal handlers.
    pub fn scope(&self) -> Scope {
        Scope {
            trace_id: self.trace_id.clone(),
            now: self.now,
            params: self.params.clone(),
            claims: self.claims.clone(),
        }
    }
}

/// Read-only view of a [`RequestContext`] owned by a terminal handler's future.
#[derive(Debug, Clone)]
pub struct Scope {
    pub trace_id: String,
    pub now: DateTime<Utc>,
    params: HashMap<String, String>,
    claims: Option<Claims>,
}

impl Scope {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// See [`RequestContext::claims`].
    pub fn claims(&self) -> Result<&Claims, WebError> {
        self.claims
            .as_ref()
            .ok_or(WebError::Shutdown(StructuralFault::MissingClaims))
    }
}

/// Holds the single wire response of a request.
#[derive(Debug, Default)]
pub struct ResponseSink {
    response: Option<Response>,
}

impl ResponseSink {
    /// Stores `response`. A second write is a structural fault.
    pub fn write(&mut self, response: Response) -> Result<(), WebError> {
        if self.response.is_some() {
            return Err(WebError::invariant("response already written"));
        }
        self.response = Some(response);
        Ok(())
    }

    pub fn is_written(&self) -> bool {
        self.response.is_some()
    }

    pub fn take(&mut self) -> Option<Response> {
        self.response.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use financify_auth::ROLE_USER;

    fn context() -> RequestContext {
        let mut params = HashMap::new();
        params.insert("id".to_string(), "42".to_string());
        RequestContext::new("trace-1", Method::GET, "/v1/users/{id}", None, params)
    }

    #[test]
    fn test_status_is_write_once() {
        let mut ctx = context();
        ctx.set_status(StatusCode::OK).unwrap();
        let err = ctx.set_status(StatusCode::NOT_FOUND).unwrap_err();
        assert!(err.is_shutdown());
        assert_eq!(ctx.status(), Some(StatusCode::OK));
    }

    #[test]
    fn test_missing_claims_is_structural() {
        let ctx = context();
        assert!(matches!(
            ctx.claims(),
            Err(WebError::Shutdown(StructuralFault::MissingClaims))
        ));
        assert!(ctx.scope().claims().is_err());
    }

    #[test]
    fn test_scope_carries_claims_and_params() {
        let mut ctx = context();
        let now = Utc::now();
        ctx.attach_claims(Claims::new(
            "financify service",
            "u1",
            vec![ROLE_USER.to_string()],
            now,
            now + chrono::Duration::hours(1),
        ));

        let scope = ctx.scope();
        assert_eq!(scope.trace_id, "trace-1");
        assert_eq!(scope.param("id"), Some("42"));
        assert_eq!(scope.param("kid"), None);
        assert_eq!(scope.claims().unwrap().sub, "u1");
    }

    #[test]
    fn test_sink_rejects_second_write() {
        let mut sink = ResponseSink::default();
        sink.write(StatusCode::OK.into_response()).unwrap();
        assert!(sink.write(StatusCode::OK.into_response()).is_err());
        assert!(sink.is_written());
        assert_eq!(sink.take().unwrap().status(), StatusCode::OK);
    }
}
