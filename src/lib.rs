//! # Financify API
//!
//! A small user-management service built on Axum and PostgreSQL, with
//! Ed25519-signed tokens and role-based authorization.
//!
//! ## Architecture
//!
//! ```text
//! src/
//! ├── web/          # Handler pipeline: context, middleware traits, router shell,
//! │                 # response translator, shutdown coordinator
//! ├── middleware/   # Error translation, panic recovery, Authenticate/Authorize
//! ├── modules/      # Feature modules
//! │   ├── health/   # Liveness and readiness probes
//! │   └── users/    # User CRUD and token issuance
//! ├── logging.rs    # Logging middleware and tracing setup
//! ├── metrics.rs    # Request counters and the debug listener
//! ├── router.rs     # Route table
//! ├── state.rs      # Shared handler dependencies
//! └── validator.rs  # Validated JSON extractor
//! ```
//!
//! Shared pieces live in workspace crates: `financify-core` (errors,
//! passwords, paging), `financify-config`, `financify-auth` (claims, key
//! registry, authenticator) and `financify-db`.
//!
//! ## Request pipeline
//!
//! Every route is wrapped, outermost first, in
//! `Logging -> Errors -> RequestMetrics -> Panics`, followed by the route's
//! own middlewares (`Authenticate`, then `Authorize`) and the handler. A
//! protected route therefore runs as
//!
//! ```text
//! Logging(Errors(RequestMetrics(Panics(Authenticate(Authorize(handler))))))
//! ```
//!
//! Handlers return a [`web::Reply`] or a [`web::WebError`]. Client errors
//! keep their status and message, everything else is answered with a
//! generic 500, and structural faults such as a handler reading claims that
//! were never attached trigger a graceful shutdown.
//!
//! ## Routes
//!
//! | Method | Path | Access |
//! |--------|------|--------|
//! | GET | `/v1/liveness` | public |
//! | GET | `/v1/readiness` | public |
//! | GET | `/v1/users/token[/{kid}]` | Basic credentials |
//! | GET, POST | `/v1/users` | ADMIN |
//! | GET, PUT | `/v1/users/{id}` | owner or ADMIN |
//! | DELETE | `/v1/users/{id}` | ADMIN |

pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod modules;
pub mod router;
pub mod state;
pub mod validator;
pub mod web;
