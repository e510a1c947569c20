use anyhow::anyhow;
use axum::extract::Request;
use axum::http::StatusCode;
use financify_core::AppError;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::state::AppState;
use crate::web::{Reply, Scope, WebError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liveness {
    pub status: String,
    pub build: String,
    pub host: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readiness {
    pub status: String,
}

/// `GET /v1/liveness`: the process is up and serving.
pub async fn liveness(_state: AppState, _scope: Scope, _req: Request) -> Result<Reply, WebError> {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "unavailable".to_string());
    Reply::ok(&Liveness {
        status: "up".to_string(),
        build: env!("CARGO_PKG_VERSION").to_string(),
        host,
    })
}

/// `GET /v1/readiness`: 503 until the user store answers.
pub async fn readiness(state: AppState, scope: Scope, _req: Request) -> Result<Reply, WebError> {
    if let Err(err) = state.users.status_check().await {
        warn!(trace_id = %scope.trace_id, error = %err, "Readiness check failed");
        return Err(AppError::new(StatusCode::SERVICE_UNAVAILABLE, anyhow!("db not ready")).into());
    }

    Reply::ok(&Readiness {
        status: "ok".to_string(),
    })
}
