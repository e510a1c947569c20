use axum::http::Method;
use financify_auth::ROLE_ADMIN;

use crate::middleware::{Authenticate, Authorize};
use crate::modules::users::controller;
use crate::state::AppState;
use crate::web::{App, BoxMiddleware, boxed, handler_fn};

pub fn init_users_routes(app: &mut App, state: &AppState) -> anyhow::Result<()> {
    let authenticate = boxed(Authenticate::new(state.auth.clone()));
    let admin_only: Vec<BoxMiddleware> = vec![
        authenticate.clone(),
        boxed(Authorize::any_of(&[ROLE_ADMIN])),
    ];
    let authenticated: Vec<BoxMiddleware> = vec![authenticate];

    let s = state.clone();
    app.handle(
        Method::GET,
        "/v1/users/token",
        handler_fn(s.clone(), controller::token),
        &[],
    )?;
    app.handle(
        Method::GET,
        "/v1/users/token/{kid}",
        handler_fn(s.clone(), controller::token),
        &[],
    )?;
    app.handle(
        Method::GET,
        "/v1/users",
        handler_fn(s.clone(), controller::query),
        &admin_only,
    )?;
    app.handle(
        Method::POST,
        "/v1/users",
        handler_fn(s.clone(), controller::create),
        &admin_only,
    )?;
    app.handle(
        Method::GET,
        "/v1/users/{id}",
        handler_fn(s.clone(), controller::query_by_id),
        &authenticated,
    )?;
    app.handle(
        Method::PUT,
        "/v1/users/{id}",
        handler_fn(s.clone(), controller::update),
        &authenticated,
    )?;
    app.handle(
        Method::DELETE,
        "/v1/users/{id}",
        handler_fn(s, controller::delete),
        &admin_only,
    )?;

    Ok(())
}
