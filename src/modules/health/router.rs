use axum::http::Method;

use crate::modules::health::controller;
use crate::state::AppState;
use crate::web::{App, handler_fn};

/// Health probes run the application-wide middlewares only.
pub fn init_health_routes(app: &mut App, state: &AppState) -> anyhow::Result<()> {
    app.handle(
        Method::GET,
        "/v1/liveness",
        handler_fn(state.clone(), controller::liveness),
        &[],
    )?;
    app.handle(
        Method::GET,
        "/v1/readiness",
        handler_fn(state.clone(), controller::readiness),
        &[],
    )?;
    Ok(())
}
