use std::fs;
use std::sync::Arc;

use tracing::{Instrument, Subscriber, error, info, info_span, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::web::{
    BoxFuture, BoxHandler, Handler, HandlerResult, Middleware, RequestContext, ResponseSink,
};

pub const DEFAULT_LOG_FILTER: &str = "financify=info,tower_http=warn,sqlx=warn";

/// Outermost middleware: one `request` span per request, a `started` event
/// on the way in and a `completed` event on the way out.
pub struct Logging;

impl Middleware for Logging {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn wrap(&self, inner: BoxHandler) -> BoxHandler {
        Arc::new(LoggingHandler { inner })
    }
}

struct LoggingHandler {
    inner: BoxHandler,
}

impl Handler for LoggingHandler {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        sink: &'a mut ResponseSink,
        req: axum::extract::Request,
    ) -> BoxFuture<'a, HandlerResult> {
        let span = info_span!("request", trace_id = %ctx.trace_id());

        Box::pin(
            async move {
                let remote_addr = ctx
                    .remote_addr()
                    .map_or_else(|| "-".to_string(), |addr| addr.to_string());
                info!(
                    method = %ctx.method(),
                    path = %ctx.path(),
                    remote_addr = %remote_addr,
                    "started"
                );

                let result = self.inner.call(ctx, sink, req).await;

                // No status means nothing was written; the shell answers 500.
                let status = ctx.status().map_or(500, |s| s.as_u16());
                let latency_ms = ctx.elapsed().as_millis() as u64;
                match status {
                    500..=599 => error!(
                        method = %ctx.method(),
                        path = %ctx.path(),
                        status,
                        latency_ms,
                        "completed"
                    ),
                    400..=499 => warn!(
                        method = %ctx.method(),
                        path = %ctx.path(),
                        status,
                        latency_ms,
                        "completed"
                    ),
                    _ => info!(
                        method = %ctx.method(),
                        path = %ctx.path(),
                        status,
                        latency_ms,
                        "completed"
                    ),
                }

                result
            }
            .instrument(span),
        )
    }
}

/// `RUST_LOG`, else `LOG_LEVEL`, else [`DEFAULT_LOG_FILTER`].
pub fn env_filter() -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|level| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Structured JSON layer, one object per event with the current span list.
pub fn json_layer<S, W>(make_writer: W) -> impl Layer<S> + Send + Sync + 'static
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .json()
        .with_writer(make_writer)
        .with_current_span(true)
        .with_span_list(true)
}

pub fn init_tracing() -> anyhow::Result<()> {
    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(true)
        .with_line_number(true)
        .compact()
        .with_filter(env_filter());

    let file_layer = match std::env::var("LOG_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            fs::create_dir_all(&dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, &dir, "financify.json");
            Some(json_layer(appender).with_filter(env_filter()))
        }
        _ => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}
