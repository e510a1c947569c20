use anyhow::{Context, anyhow};
use axum::extract::{FromRequest, Query, Request};
use axum_extra::headers::authorization::Basic;
use axum_extra::headers::{Authorization, HeaderMapExt};
use financify_core::{AppError, PaginationParams};
use tracing::{info, instrument};

use crate::modules::users::model::{NewUser, Token, UpdateUser};
use crate::modules::users::service::{UserError, ensure_owner_or_admin, parse_id};
use crate::state::AppState;
use crate::validator::ValidatedJson;
use crate::web::{Reply, Scope, WebError};

pub const BASIC_AUTH_MESSAGE: &str = "must provide email and password in Basic auth";

fn id_param(scope: &Scope) -> Result<uuid::Uuid, UserError> {
    parse_id(scope.param("id").unwrap_or_default())
}

/// `GET /v1/users`, admins only.
#[instrument(skip_all, fields(trace_id = %scope.trace_id))]
pub async fn query(state: AppState, scope: Scope, req: Request) -> Result<Reply, WebError> {
    let Query(page) = Query::<PaginationParams>::try_from_uri(req.uri())
        .map_err(|e| AppError::bad_request(anyhow!("invalid paging parameters: {e}")))?;

    let users = state.users.query(&page).await?;
    Reply::ok(&users)
}

/// `GET /v1/users/{id}`, the user themselves or an admin.
#[instrument(skip_all, fields(trace_id = %scope.trace_id))]
pub async fn query_by_id(state: AppState, scope: Scope, _req: Request) -> Result<Reply, WebError> {
    let id = id_param(&scope)?;
    ensure_owner_or_admin(scope.claims()?, id)?;

    let user = state.users.query_by_id(id).await?;
    Reply::ok(&user)
}

/// `POST /v1/users`, admins only.
#[instrument(skip_all, fields(trace_id = %scope.trace_id))]
pub async fn create(state: AppState, scope: Scope, req: Request) -> Result<Reply, WebError> {
    let ValidatedJson(new_user) = ValidatedJson::<NewUser>::from_request(req, &()).await?;

    let user = state.users.create(new_user, scope.now).await?;
    info!(user_id = %user.id, "User created");
    Reply::created(&user)
}

/// `PUT /v1/users/{id}`. Only admins may change roles.
#[instrument(skip_all, fields(trace_id = %scope.trace_id))]
pub async fn update(state: AppState, scope: Scope, req: Request) -> Result<Reply, WebError> {
    let id = id_param(&scope)?;
    let claims = scope.claims()?;
    ensure_owner_or_admin(claims, id)?;

    let ValidatedJson(update) = ValidatedJson::<UpdateUser>::from_request(req, &()).await?;
    if update.roles.is_some() && !claims.is_admin() {
        return Err(UserError::Forbidden.into());
    }

    state.users.update(id, update, scope.now).await?;
    Ok(Reply::no_content())
}

/// `DELETE /v1/users/{id}`, admins only.
#[instrument(skip_all, fields(trace_id = %scope.trace_id))]
pub async fn delete(state: AppState, scope: Scope, _req: Request) -> Result<Reply, WebError> {
    let id = id_param(&scope)?;

    state.users.delete(id).await?;
    info!(user_id = %id, "User deleted");
    Ok(Reply::no_content())
}

/// `GET /v1/users/token[/{kid}]`: exchanges Basic credentials for a token.
///
/// Without a `kid` the registry's active key signs the token.
#[instrument(skip_all, fields(trace_id = %scope.trace_id))]
pub async fn token(state: AppState, scope: Scope, req: Request) -> Result<Reply, WebError> {
    let credentials = req
        .headers()
        .typed_get::<Authorization<Basic>>()
        .ok_or_else(|| AppError::unauthorized(anyhow!(BASIC_AUTH_MESSAGE)))?;

    let kid = scope.param("kid");
    if let Some(kid) = kid {
        if !state.auth.keys().contains(kid) {
            return Err(AppError::bad_request(anyhow!("unknown key id {kid:?}")).into());
        }
    }

    let user = state
        .users
        .authenticate(credentials.username(), credentials.password())
        .await?;

    let claims = state
        .auth
        .claims_for(user.id.to_string(), user.roles.clone(), scope.now);
    let token = match kid {
        Some(kid) => state.auth.issue(kid, &claims),
        None => state.auth.issue_active(&claims),
    }
    .context("generating token")?;

    Reply::ok(&Token { token })
}
