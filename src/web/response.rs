//! Response translator: the only place a wire response is produced.
//!
//! Terminal handlers return a [`Reply`]; [`respond`] records its status on
//! the context and writes the bytes into the sink. Error translation goes
//! through [`respond_error`], which decides whether the client sees the
//! error's own message or a generic 500.

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use financify_core::ErrorResponse;
use serde::Serialize;

use super::context::{RequestContext, ResponseSink};
use super::error::WebError;

/// A successful outcome waiting to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Option<Vec<u8>>,
}

impl Reply {
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Self, WebError> {
        let body = serde_json::to_vec(value).map_err(anyhow::Error::from)?;
        Ok(Self {
            status,
            body: Some(body),
        })
    }

    pub fn ok<T: Serialize>(value: &T) -> Result<Self, WebError> {
        Self::json(StatusCode::OK, value)
    }

    pub fn created<T: Serialize>(value: &T) -> Result<Self, WebError> {
        Self::json(StatusCode::CREATED, value)
    }

    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: None,
        }
    }
}

/// Writes `reply` as the request's response.
///
/// A 204 never carries a body, whatever the reply holds.
pub fn respond(
    ctx: &mut RequestContext,
    sink: &mut ResponseSink,
    reply: Reply,
) -> Result<(), WebError> {
    ctx.set_status(reply.status)?;

    let mut response = match reply.body {
        Some(bytes) if reply.status != StatusCode::NO_CONTENT => {
            let mut response = Response::new(Body::from(bytes));
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            response
        }
        _ => Response::new(Body::empty()),
    };
    *response.status_mut() = reply.status;

    sink.write(response)
}

/// Renders `err` for the client.
///
/// Typed request errors keep their status and message unless the status is
/// 500. Everything else becomes `{"error":"Internal Server Error"}`.
pub fn respond_error(
    ctx: &mut RequestContext,
    sink: &mut ResponseSink,
    err: &WebError,
) -> Result<(), WebError> {
    let (status, body) = match err {
        WebError::Request(app) => (app.status, app.to_body()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::internal()),
    };
    respond(ctx, sink, Reply::json(status, &body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use axum::body::to_bytes;
    use axum::http::Method;
    use financify_core::{AppError, INTERNAL_ERROR_MESSAGE};
    use std::collections::HashMap;

    fn context() -> RequestContext {
        RequestContext::new("t", Method::GET, "/", None, HashMap::new())
    }

    async fn body_of(sink: &mut ResponseSink) -> (StatusCode, Vec<u8>) {
        let response = sink.take().unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_no_content_has_no_body() {
        let mut ctx = context();
        let mut sink = ResponseSink::default();
        let reply = Reply {
            status: StatusCode::NO_CONTENT,
            body: Some(b"ignored".to_vec()),
        };
        respond(&mut ctx, &mut sink, reply).unwrap();

        let (status, body) = body_of(&mut sink).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_second_respond_is_rejected() {
        let mut ctx = context();
        let mut sink = ResponseSink::default();
        respond(&mut ctx, &mut sink, Reply::no_content()).unwrap();
        let err = respond(&mut ctx, &mut sink, Reply::no_content()).unwrap_err();
        assert!(err.is_shutdown());
    }

    #[tokio::test]
    async fn test_client_error_keeps_message() {
        let mut ctx = context();
        let mut sink = ResponseSink::default();
        let err = WebError::from(AppError::not_found(anyhow!("user not found")));
        respond_error(&mut ctx, &mut sink, &err).unwrap();

        let (status, body) = body_of(&mut sink).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, br#"{"error":"user not found"}"#);
        assert_eq!(ctx.status(), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_internal_error_is_generic() {
        for err in [
            WebError::from(anyhow!("connection refused on 10.0.0.3")),
            WebError::from(AppError::internal(anyhow!("secret detail"))),
            WebError::Panic {
                message: "panic: boom".to_string(),
                backtrace: String::new(),
            },
        ] {
            let mut ctx = context();
            let mut sink = ResponseSink::default();
            respond_error(&mut ctx, &mut sink, &err).unwrap();

            let (status, body) = body_of(&mut sink).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(json, serde_json::json!({ "error": INTERNAL_ERROR_MESSAGE }));
        }
    }
}
