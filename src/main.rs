use std::net::SocketAddr;

use anyhow::{Context, bail};
use dotenvy::dotenv;
use financify::logging::init_tracing;
use financify::metrics::{debug_router, init_metrics};
use financify::router::{init_router, with_request_timeout};
use financify::state::init_app_state;
use financify::web::{ShutdownHandle, serve, wait_for_os_signal};
use financify_config::{AuthConfig, DatabaseConfig, WebConfig};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing().context("initializing tracing")?;

    let web = WebConfig::from_env();
    let auth = AuthConfig::from_env();
    let database = DatabaseConfig::from_env();
    info!(
        api_host = %web.api_host,
        debug_host = %web.debug_host,
        keys_dir = %auth.keys_dir.display(),
        version = env!("CARGO_PKG_VERSION"),
        "Starting financify"
    );

    let state = init_app_state(&auth, &database)?;

    let prometheus = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Prometheus exporter unavailable, /metrics disabled");
            None
        }
    };
    let debug_listener = tokio::net::TcpListener::bind(&web.debug_host)
        .await
        .with_context(|| format!("binding debug listener on {}", web.debug_host))?;
    let debug_app = debug_router(state.metrics.clone(), prometheus);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(debug_listener, debug_app).await {
            error!(error = %e, "Debug listener stopped");
        }
    });

    let shutdown = ShutdownHandle::new();
    let app = with_request_timeout(init_router(&state, shutdown.clone())?, web.request_timeout);

    let listener = tokio::net::TcpListener::bind(&web.api_host)
        .await
        .with_context(|| format!("binding API listener on {}", web.api_host))?;
    let local: SocketAddr = listener.local_addr()?;
    info!(addr = %local, "API listening");

    let report = serve(
        listener,
        app,
        shutdown,
        wait_for_os_signal(),
        web.shutdown_timeout,
    )
    .await;

    if !report.graceful {
        bail!("shutdown did not complete gracefully: {}", report.reason);
    }
    Ok(())
}
