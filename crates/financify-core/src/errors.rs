//! Application error type shared by every HTTP-facing layer.
//!
//! [`AppError`] pairs an HTTP status with an [`anyhow::Error`] and, for
//! validation failures, a list of per-field errors. It is the
//! "domain-classified failure" of the request pipeline: whatever status it
//! carries is the status the client sees.
//!
//! A status of `500 Internal Server Error` is special. The message is kept
//! for server-side logs only and the client always receives the generic
//! [`ErrorResponse::internal`] body.

use std::fmt;

use anyhow::{Error, anyhow};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use validator::ValidationErrors;

/// Body returned for every unclassified failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

/// A single failed field in a request payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub error: String,
}

/// Wire shape of every error response: `{"error": "...", "fields": [...]}`.
///
/// `fields` is omitted when empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl ErrorResponse {
    /// The fixed, non-leaking body used for 500 responses.
    #[must_use]
    pub fn internal() -> Self {
        Self {
            error: INTERNAL_ERROR_MESSAGE.to_string(),
            fields: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error: Error,
    pub fields: Vec<FieldError>,
}

impl AppError {
    pub fn new<E>(status: StatusCode, err: E) -> Self
    where
        E: Into<Error>,
    {
        Self {
            status,
            error: err.into(),
            fields: Vec::new(),
        }
    }

    pub fn internal<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err)
    }

    pub fn not_found<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::NOT_FOUND, err)
    }

    pub fn unprocessable<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, err)
    }

    pub fn bad_request<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::BAD_REQUEST, err)
    }

    pub fn unauthorized<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::UNAUTHORIZED, err)
    }

    pub fn forbidden<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::FORBIDDEN, err)
    }

    pub fn database<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err)
    }

    /// Builds a 422 carrying one [`FieldError`] per failed validation rule.
    ///
    /// Fields are sorted by name so the body is stable across runs.
    pub fn validation(errors: &ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| FieldError {
                    // Struct-level rules report under `__all__`; their code names the field.
                    field: if *field == "__all__" {
                        error.code.to_string()
                    } else {
                        field.to_string()
                    },
                    error: error
                        .message
                        .as_ref()
                        .map(|msg| msg.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field)),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field).then_with(|| a.error.cmp(&b.error)));

        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            error: anyhow!("field validation error"),
            fields,
        }
    }

    /// Returns the body the client is allowed to see.
    #[must_use]
    pub fn to_body(&self) -> ErrorResponse {
        if self.status == StatusCode::INTERNAL_SERVER_ERROR {
            return ErrorResponse::internal();
        }

        ErrorResponse {
            error: self.error.to_string(),
            fields: self.fields.clone(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.to_body())).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        AppError::internal(err)
    }
}
