//! Handler pipeline.
//!
//! Requests flow through an explicit chain of [`Middleware`] wrapping a
//! terminal [`Handler`]. State travels in a [`RequestContext`] passed by
//! reference, the response is written once through the translator in
//! [`response`], and structural faults escalate to the shutdown coordinator
//! in [`shutdown`].

pub mod app;
pub mod context;
pub mod error;
pub mod handler;
pub mod response;
pub mod shutdown;

pub use app::{App, SHUTTING_DOWN_MESSAGE, TRACE_ID_HEADER, boxed};
pub use context::{RequestContext, ResponseSink, Scope};
pub use error::{StructuralFault, WebError};
pub use handler::{
    BoxFuture, BoxHandler, BoxMiddleware, Handler, HandlerResult, Middleware, handler_fn,
    wrap_middleware,
};
pub use response::{Reply, respond, respond_error};
pub use shutdown::{ShutdownHandle, ShutdownReason, ShutdownReport, serve, wait_for_os_signal};
