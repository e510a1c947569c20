use std::sync::Arc;

use tracing::{error, warn};

use crate::web::{
    BoxFuture, BoxHandler, Handler, HandlerResult, Middleware, RequestContext, ResponseSink,
    WebError, respond_error,
};

/// Error translation: the one place a failed result becomes a wire response.
///
/// Shutdown errors are logged and passed outward untouched so the router
/// shell can stop the server. Everything else is rendered through
/// [`respond_error`] and swallowed.
pub struct Errors;

impl Middleware for Errors {
    fn name(&self) -> &'static str {
        "errors"
    }

    fn wrap(&self, inner: BoxHandler) -> BoxHandler {
        Arc::new(ErrorsHandler { inner })
    }
}

struct ErrorsHandler {
    inner: BoxHandler,
}

impl Handler for ErrorsHandler {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        sink: &'a mut ResponseSink,
        req: axum::extract::Request,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let err = match self.inner.call(ctx, sink, req).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            match &err {
                WebError::Shutdown(fault) => {
                    error!(trace_id = %ctx.trace_id(), fault = %fault, "Structural fault");
                    return Err(err);
                }
                WebError::Panic { message, backtrace } => {
                    error!(
                        trace_id = %ctx.trace_id(),
                        error = %message,
                        backtrace = %backtrace,
                        "Recovered from panic"
                    );
                }
                WebError::Request(app) if !app.status.is_server_error() => {
                    warn!(trace_id = %ctx.trace_id(), status = app.status.as_u16(), error = %app, "Request failed");
                }
                other => {
                    error!(trace_id = %ctx.trace_id(), error = ?other, "Request failed");
                }
            }

            if sink.is_written() {
                warn!(trace_id = %ctx.trace_id(), "Response already written, dropping error");
                return Ok(());
            }

            respond_error(ctx, sink, &err)
        })
    }
}
