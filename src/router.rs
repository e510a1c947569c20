use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use tower_http::timeout::TimeoutLayer;

use crate::logging::Logging;
use crate::metrics::RequestMetrics;
use crate::middleware::{Errors, Panics};
use crate::modules::health::router::init_health_routes;
use crate::modules::users::router::init_users_routes;
use crate::state::AppState;
use crate::web::{App, ShutdownHandle, boxed};

/// Builds the application with every route registered.
///
/// Application-wide middlewares run in this order on every request:
/// logging, error translation, metrics, panic recovery.
pub fn init_app(state: &AppState, shutdown: ShutdownHandle) -> anyhow::Result<App> {
    let mut app = App::new(
        shutdown,
        vec![
            boxed(Logging),
            boxed(Errors),
            boxed(RequestMetrics::new(state.metrics.clone())),
            boxed(Panics::new()),
        ],
    );

    init_health_routes(&mut app, state)?;
    init_users_routes(&mut app, state)?;

    Ok(app)
}

pub fn init_router(state: &AppState, shutdown: ShutdownHandle) -> anyhow::Result<Router> {
    Ok(init_app(state, shutdown)?.into_router())
}

/// Bounds every request to `timeout`; slower ones are answered with a 408.
pub fn with_request_timeout(router: Router, timeout: Duration) -> Router {
    router.layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
}
