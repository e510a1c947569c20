//! Handler and middleware abstractions.
//!
//! A [`Handler`] takes the request context, the response sink and the request,
//! and returns `Ok(())` once a response has been written or a [`WebError`]
//! otherwise. A [`Middleware`] turns one handler into another. Chains are
//! composed once, when a route is registered, and then shared by every
//! request on that route.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::Request;

use super::context::{RequestContext, ResponseSink, Scope};
use super::error::WebError;
use super::response::{Reply, respond};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type HandlerResult = Result<(), WebError>;

pub trait Handler: Send + Sync + 'static {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        sink: &'a mut ResponseSink,
        req: Request,
    ) -> BoxFuture<'a, HandlerResult>;
}

pub type BoxHandler = Arc<dyn Handler>;

pub trait Middleware: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn wrap(&self, inner: BoxHandler) -> BoxHandler;
}

pub type BoxMiddleware = Arc<dyn Middleware>;

/// Wraps `handler` so that `middlewares[0]` is the outermost layer.
pub fn wrap_middleware(middlewares: &[BoxMiddleware], handler: BoxHandler) -> BoxHandler {
    middlewares
        .iter()
        .rev()
        .fold(handler, |inner, mw| mw.wrap(inner))
}

/// Adapts an async function into a terminal [`Handler`].
///
/// `f` receives a clone of `state`, an owned [`Scope`] and the request, and
/// returns a [`Reply`] which is written through the response translator.
///
/// ```ignore
/// async fn query(state: AppState, scope: Scope, req: Request) -> Result<Reply, WebError> {
///     Reply::ok(&state.users.query(&PaginationParams::default()).await?)
/// }
///
/// let handler = handler_fn(state.clone(), query);
/// ```
pub fn handler_fn<S, F, Fut>(state: S, f: F) -> BoxHandler
where
    S: Clone + Send + Sync + 'static,
    F: Fn(S, Scope, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, WebError>> + Send + 'static,
{
    Arc::new(FnHandler { state, f })
}

struct FnHandler<S, F> {
    state: S,
    f: F,
}

impl<S, F, Fut> Handler for FnHandler<S, F>
where
    S: Clone + Send + Sync + 'static,
    F: Fn(S, Scope, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, WebError>> + Send + 'static,
{
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        sink: &'a mut ResponseSink,
        req: Request,
    ) -> BoxFuture<'a, HandlerResult> {
        let fut = (self.f)(self.state.clone(), ctx.scope(), req);
        Box::pin(async move {
            let reply = fut.await?;
            respond(ctx, sink, reply)
        })
    }
}
