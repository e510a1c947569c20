//! User persistence.
//!
//! [`UserStore`] is the seam between the HTTP handlers and storage.
//! [`PgUserStore`] is the production implementation; an in-memory one lives
//! in [`super::memory`] for tests.

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use bcrypt::DEFAULT_COST;
use chrono::{DateTime, Utc};
use financify_auth::Claims;
use financify_core::{AppError, PaginationParams, hash_password_with_cost, verify_password};
use sqlx::PgPool;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::model::{NewUser, UpdateUser, User};
use crate::web::WebError;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("user not found")]
    NotFound,

    #[error("ID is not in its proper form")]
    InvalidId,

    #[error("authorization failed")]
    Forbidden,

    #[error("authentication failed")]
    AuthenticationFailure,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<AppError> for UserError {
    fn from(err: AppError) -> Self {
        UserError::Internal(err.error)
    }
}

impl From<UserError> for WebError {
    fn from(err: UserError) -> Self {
        let message = anyhow!("{err}");
        match err {
            UserError::NotFound => AppError::not_found(message).into(),
            UserError::InvalidId => AppError::bad_request(message).into(),
            UserError::Forbidden => AppError::forbidden(message).into(),
            UserError::AuthenticationFailure => AppError::unauthorized(message).into(),
            UserError::Internal(err) => WebError::Internal(err),
        }
    }
}

pub fn parse_id(raw: &str) -> Result<Uuid, UserError> {
    Uuid::parse_str(raw).map_err(|_| UserError::InvalidId)
}

/// Only admins may act on someone else's record.
pub fn ensure_owner_or_admin(claims: &Claims, id: Uuid) -> Result<(), UserError> {
    if claims.is_admin() || claims.sub == id.to_string() {
        Ok(())
    } else {
        Err(UserError::Forbidden)
    }
}

/// Builds the stored record for `new_user`, hashing its password.
pub fn new_record(new_user: NewUser, hash_cost: u32, now: DateTime<Utc>) -> Result<User, UserError> {
    let password_hash = hash_password_with_cost(&new_user.password, hash_cost)?;
    Ok(User {
        id: Uuid::new_v4(),
        name: new_user.name,
        email: new_user.email,
        roles: new_user.roles,
        password_hash,
        date_created: now,
        date_updated: now,
    })
}

/// Applies the fields present in `update` to `user`.
pub fn apply_update(
    user: &mut User,
    update: UpdateUser,
    hash_cost: u32,
    now: DateTime<Utc>,
) -> Result<(), UserError> {
    if let Some(name) = update.name {
        user.name = name;
    }
    if let Some(email) = update.email {
        user.email = email;
    }
    if let Some(roles) = update.roles {
        user.roles = roles;
    }
    if let Some(password) = update.password {
        user.password_hash = hash_password_with_cost(&password, hash_cost)?;
    }
    user.date_updated = now;
    Ok(())
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, new_user: NewUser, now: DateTime<Utc>) -> Result<User, UserError>;

    async fn update(&self, id: Uuid, update: UpdateUser, now: DateTime<Utc>) -> Result<(), UserError>;

    /// Deleting an absent user succeeds.
    async fn delete(&self, id: Uuid) -> Result<(), UserError>;

    async fn query(&self, page: &PaginationParams) -> Result<Vec<User>, UserError>;

    async fn query_by_id(&self, id: Uuid) -> Result<User, UserError>;

    async fn query_by_email(&self, email: &str) -> Result<User, UserError>;

    /// Readiness probe for the backing store.
    async fn status_check(&self) -> Result<(), UserError>;

    /// Looks up `email` and verifies `password` against the stored bcrypt
    /// hash. An unknown email and a wrong password are indistinguishable.
    async fn authenticate(&self, email: &str, password: &str) -> Result<User, UserError> {
        let user = match self.query_by_email(email).await {
            Ok(user) => user,
            Err(UserError::NotFound) => return Err(UserError::AuthenticationFailure),
            Err(err) => return Err(err),
        };

        if !verify_password(password, &user.password_hash)? {
            debug!(user_id = %user.id, "Password mismatch");
            return Err(UserError::AuthenticationFailure);
        }

        Ok(user)
    }
}

const USER_COLUMNS: &str =
    "user_id, name, email, roles, password_hash, date_created, date_updated";

#[derive(Debug, Clone)]
pub struct PgUserStore {
    db: PgPool,
    hash_cost: u32,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self::with_cost(db, DEFAULT_COST)
    }

    pub fn with_cost(db: PgPool, hash_cost: u32) -> Self {
        Self { db, hash_cost }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new_user: NewUser, now: DateTime<Utc>) -> Result<User, UserError> {
        let user = new_record(new_user, self.hash_cost, now)?;

        sqlx::query(
            r#"
            INSERT INTO users (user_id, name, email, roles, password_hash, date_created, date_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.roles)
        .bind(&user.password_hash)
        .bind(user.date_created)
        .bind(user.date_updated)
        .execute(&self.db)
        .await
        .context("Failed to insert user")?;

        Ok(user)
    }

    async fn update(&self, id: Uuid, update: UpdateUser, now: DateTime<Utc>) -> Result<(), UserError> {
        let mut user = self.query_by_id(id).await?;
        apply_update(&mut user, update, self.hash_cost, now)?;

        sqlx::query(
            r#"
            UPDATE users
            SET name = $2, email = $3, roles = $4, password_hash = $5, date_updated = $6
            WHERE user_id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.roles)
        .bind(&user.password_hash)
        .bind(user.date_updated)
        .execute(&self.db)
        .await
        .with_context(|| format!("Failed to update user {id}"))?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), UserError> {
        sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .with_context(|| format!("Failed to delete user {id}"))?;

        Ok(())
    }

    async fn query(&self, page: &PaginationParams) -> Result<Vec<User>, UserError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY date_created, user_id LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await
        .context("Failed to fetch users")?;

        Ok(users)
    }

    async fn query_by_id(&self, id: Uuid) -> Result<User, UserError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("Failed to fetch user {id}"))?
            .ok_or(UserError::NotFound)
    }

    async fn query_by_email(&self, email: &str) -> Result<User, UserError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("Failed to fetch user {email:?}"))?
            .ok_or(UserError::NotFound)
    }

    async fn status_check(&self) -> Result<(), UserError> {
        financify_db::status_check(&self.db)
            .await
            .context("Database status check failed")?;
        Ok(())
    }
}
