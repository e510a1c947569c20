//! Middlewares for the request pipeline.
//!
//! Application-wide, outermost first:
//!
//! - [`crate::logging::Logging`]
//! - [`errors::Errors`]: translates failed results into responses
//! - [`crate::metrics::RequestMetrics`]
//! - [`panics::Panics`]: turns panics into errors
//!
//! Per route, innermost:
//!
//! - [`auth::Authenticate`]: `Authorization: Bearer <token>` to claims
//! - [`auth::Authorize`]: any-of role check on those claims

pub mod auth;
pub mod errors;
pub mod panics;

pub use auth::{Authenticate, Authorize};
pub use errors::Errors;
pub use panics::Panics;
