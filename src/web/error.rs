//! Outcome type of every handler in the pipeline.

use axum::http::StatusCode;
use financify_core::AppError;
use thiserror::Error;

/// A programming-invariant violation inside the pipeline itself.
///
/// These are never a client's fault. They are re-raised past error
/// translation so the router shell can start a graceful shutdown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralFault {
    /// A handler read claims that no `Authenticate` middleware attached.
    #[error("claims missing from request context")]
    MissingClaims,

    #[error("{0}")]
    Invariant(String),
}

#[derive(Debug, Error)]
pub enum WebError {
    /// Client error or other domain-classified failure. Rendered with its own
    /// status and message.
    #[error("{0}")]
    Request(AppError),

    /// Escalates to shutdown. Never rendered by error translation.
    #[error("shutdown requested: {0}")]
    Shutdown(StructuralFault),

    /// A panic caught by the recovery middleware.
    #[error("{message}")]
    Panic { message: String, backtrace: String },

    /// Anything else; rendered as an opaque 500.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WebError {
    pub fn invariant(detail: impl Into<String>) -> Self {
        WebError::Shutdown(StructuralFault::Invariant(detail.into()))
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        matches!(self, WebError::Shutdown(_))
    }

    /// Status the client will see for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::Request(err) => err.status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AppError> for WebError {
    fn from(err: AppError) -> Self {
        WebError::Request(err)
    }
}

impl From<StructuralFault> for WebError {
    fn from(fault: StructuralFault) -> Self {
        WebError::Shutdown(fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_only_structural_faults_request_shutdown() {
        assert!(WebError::from(StructuralFault::MissingClaims).is_shutdown());
        assert!(!WebError::from(AppError::forbidden(anyhow!("no"))).is_shutdown());
        assert!(!WebError::from(anyhow!("db down")).is_shutdown());
        assert!(
            !WebError::Panic {
                message: "panic: boom".to_string(),
                backtrace: String::new(),
            }
            .is_shutdown()
        );
    }

    #[test]
    fn test_status() {
        assert_eq!(
            WebError::from(AppError::not_found(anyhow!("user not found"))).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            WebError::from(anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            WebError::from(StructuralFault::MissingClaims).to_string(),
            "shutdown requested: claims missing from request context"
        );
    }
}
