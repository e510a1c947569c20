//! Authenticate and Authorize route middlewares.
//!
//! `Authenticate` turns a `Bearer` token into [`Claims`] on the request
//! context. `Authorize` checks those claims against a role set and must
//! always sit inside `Authenticate`; if it finds no claims the route was
//! wired wrong and the request escalates to shutdown.

use std::sync::Arc;

use anyhow::anyhow;
use axum::http::header;
use financify_auth::{AuthError, Authenticator, Claims};
use financify_core::AppError;
use tracing::{debug, warn};

use crate::web::{
    BoxFuture, BoxHandler, Handler, HandlerResult, Middleware, RequestContext, ResponseSink,
};

pub const BEARER_FORMAT_MESSAGE: &str = "expected authorization header format: Bearer <token>";
pub const FORBIDDEN_MESSAGE: &str = "you are not authorized for that action";

/// Extracts the token from an `Authorization` header value.
///
/// The header must be exactly two whitespace-separated parts, the first of
/// which is `bearer` in any case.
pub fn parse_bearer(value: &str) -> Option<&str> {
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Some(token),
        _ => None,
    }
}

pub struct Authenticate {
    auth: Arc<Authenticator>,
}

impl Authenticate {
    pub fn new(auth: Arc<Authenticator>) -> Self {
        Self { auth }
    }
}

impl Middleware for Authenticate {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    fn wrap(&self, inner: BoxHandler) -> BoxHandler {
        Arc::new(AuthenticateHandler {
            auth: self.auth.clone(),
            inner,
        })
    }
}

struct AuthenticateHandler {
    auth: Arc<Authenticator>,
    inner: BoxHandler,
}

impl AuthenticateHandler {
    fn claims_from(&self, req: &axum::extract::Request) -> Result<Claims, AppError> {
        let token = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_bearer)
            .ok_or_else(|| AppError::unauthorized(anyhow!(BEARER_FORMAT_MESSAGE)))?;

        self.auth.validate(token).map_err(|err| {
            if let AuthError::InvalidToken(reason) = &err {
                debug!(reason = %reason, "Token rejected");
            } else {
                warn!(error = %err, "Token validation failed");
            }
            AppError::unauthorized(anyhow!("{err}"))
        })
    }
}

impl Handler for AuthenticateHandler {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        sink: &'a mut ResponseSink,
        req: axum::extract::Request,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let claims = self.claims_from(&req)?;
            ctx.attach_claims(claims);
            self.inner.call(ctx, sink, req).await
        })
    }
}

/// Passes the request on when the caller holds any of `roles`.
pub struct Authorize {
    roles: Arc<[String]>,
}

impl Authorize {
    pub fn any_of(roles: &[&str]) -> Self {
        Self {
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }
}

impl Middleware for Authorize {
    fn name(&self) -> &'static str {
        "authorize"
    }

    fn wrap(&self, inner: BoxHandler) -> BoxHandler {
        Arc::new(AuthorizeHandler {
            roles: self.roles.clone(),
            inner,
        })
    }
}

struct AuthorizeHandler {
    roles: Arc<[String]>,
    inner: BoxHandler,
}

impl Handler for AuthorizeHandler {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        sink: &'a mut ResponseSink,
        req: axum::extract::Request,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let claims = ctx.claims()?;
            let wanted: Vec<&str> = self.roles.iter().map(String::as_str).collect();
            if !claims.authorize(&wanted) {
                debug!(subject = %claims.sub, roles = ?claims.roles, wanted = ?wanted, "Role check failed");
                return Err(AppError::forbidden(anyhow!(FORBIDDEN_MESSAGE)).into());
            }
            self.inner.call(ctx, sink, req).await
        })
    }
}
