//! Router shell: binds pipelines to `(method, path)` pairs.
//!
//! Every route gets its own chain, composed once at registration time from
//! the route's middlewares (innermost) and the application-wide middlewares
//! (outermost). The shell builds the [`RequestContext`], runs the chain, and
//! turns whatever is in the [`ResponseSink`] into the axum response. A
//! [`WebError::Shutdown`] escaping the chain starts a graceful shutdown, and
//! a hard stop on the [`ShutdownHandle`] cuts every running chain off.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::anyhow;
use axum::extract::{ConnectInfo, Path, Request};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter};
use axum::{Json, RequestExt, Router};
use financify_core::ErrorResponse;
use tracing::{error, warn};
use uuid::Uuid;

use super::context::{RequestContext, ResponseSink};
use super::error::WebError;
use super::handler::{BoxHandler, BoxMiddleware, Middleware, wrap_middleware};
use super::shutdown::{ShutdownHandle, ShutdownReason};

pub const TRACE_ID_HEADER: HeaderName = HeaderName::from_static("x-trace-id");

/// Body of the 503 sent to requests cut off by a hard stop.
pub const SHUTTING_DOWN_MESSAGE: &str = "server shutting down";

pub struct App {
    routes: HashMap<String, MethodRouter>,
    registered: HashSet<(Method, String)>,
    middlewares: Vec<BoxMiddleware>,
    shutdown: ShutdownHandle,
}

impl App {
    /// `middlewares[0]` runs first on every request.
    pub fn new(shutdown: ShutdownHandle, middlewares: Vec<BoxMiddleware>) -> Self {
        Self {
            routes: HashMap::new(),
            registered: HashSet::new(),
            middlewares,
            shutdown,
        }
    }

    pub fn shutdown(&self) -> &ShutdownHandle {
        &self.shutdown
    }

    /// Registers `handler` for `method` on `path`.
    ///
    /// `path` uses axum syntax (`/v1/users/{id}`). Registering the same
    /// method and path twice is an error.
    pub fn handle(
        &mut self,
        method: Method,
        path: &str,
        handler: BoxHandler,
        route_middlewares: &[BoxMiddleware],
    ) -> anyhow::Result<()> {
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|e| anyhow!("cannot route {method} {path}: {e}"))?;

        let chain = wrap_middleware(route_middlewares, handler);
        let chain = wrap_middleware(&self.middlewares, chain);

        let shell = Shell {
            chain,
            shutdown: self.shutdown.clone(),
            has_params: path.contains('{'),
        };
        let endpoint = move |req: Request| {
            let shell = shell.clone();
            async move { shell.dispatch(req).await }
        };

        if !self.registered.insert((method.clone(), path.to_string())) {
            return Err(anyhow!("route {method} {path} registered twice"));
        }
        let methods = self.routes.remove(path).unwrap_or_else(MethodRouter::new);
        self.routes.insert(path.to_string(), methods.on(filter, endpoint));
        Ok(())
    }

    pub fn into_router(self) -> Router {
        self.routes
            .into_iter()
            .fold(Router::new(), |router, (path, methods)| {
                router.route(&path, methods)
            })
    }
}

#[derive(Clone)]
struct Shell {
    chain: BoxHandler,
    shutdown: ShutdownHandle,
    has_params: bool,
}

impl Shell {
    async fn dispatch(self, mut req: Request) -> Response {
        let params = if self.has_params {
            match req.extract_parts::<Path<HashMap<String, String>>>().await {
                Ok(Path(params)) => params,
                Err(rejection) => return rejection.into_response(),
            }
        } else {
            HashMap::new()
        };

        let remote_addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let trace_id = Uuid::new_v4().to_string();
        let mut ctx = RequestContext::new(
            trace_id.clone(),
            req.method().clone(),
            req.uri().path(),
            remote_addr,
            params,
        );
        let mut sink = ResponseSink::default();

        let result = tokio::select! {
            result = self.chain.call(&mut ctx, &mut sink, req) => result,
            _ = self.shutdown.stopped() => {
                warn!(trace_id = %trace_id, "Request cut off by hard stop");
                return stopped_response(&trace_id);
            }
        };

        if let Err(err) = result {
            match err {
                WebError::Shutdown(fault) => {
                    error!(trace_id = %trace_id, fault = %fault, "Structural fault, shutting down");
                    self.shutdown.signal(ShutdownReason::Fault(fault.to_string()));
                }
                other => {
                    error!(trace_id = %trace_id, error = %other, "Error escaped the middleware chain");
                }
            }
        }

        let mut response = sink.take().unwrap_or_else(|| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::internal()),
            )
                .into_response()
        });
        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert(TRACE_ID_HEADER, value);
        }
        response
    }
}

fn stopped_response(trace_id: &str) -> Response {
    let mut response = (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: SHUTTING_DOWN_MESSAGE.to_string(),
            fields: Vec::new(),
        }),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}

pub fn boxed<M: Middleware + 'static>(middleware: M) -> BoxMiddleware {
    Arc::new(middleware)
}
