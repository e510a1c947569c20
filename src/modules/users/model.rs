//! User entity and request payloads.

use chrono::{DateTime, Utc};
use financify_auth::KNOWN_ROLES;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    #[sqlx(rename = "user_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[validate(custom(function = "validate_roles"))]
    pub roles: Vec<String>,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "passwords do not match"))]
    pub password_confirm: String,
}

/// Partial update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "passwords_match"))]
pub struct UpdateUser {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "email must be a valid email address"))]
    pub email: Option<String>,
    #[validate(custom(function = "validate_roles"))]
    pub roles: Option<Vec<String>>,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

/// A confirmation, when sent, must equal the new password.
fn passwords_match(update: &UpdateUser) -> Result<(), ValidationError> {
    if update.password_confirm.is_some() && update.password_confirm != update.password {
        return Err(ValidationError::new("password_confirm").with_message("passwords do not match".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub token: String,
}

fn validate_roles(roles: &Vec<String>) -> Result<(), ValidationError> {
    if roles.is_empty() {
        return Err(ValidationError::new("roles").with_message("at least one role is required".into()));
    }
    if let Some(unknown) = roles.iter().find(|r| !KNOWN_ROLES.contains(&r.as_str())) {
        return Err(ValidationError::new("roles")
            .with_message(format!("unknown role {unknown:?}, expected one of {KNOWN_ROLES:?}").into()));
    }
    Ok(())
}
