pub mod controller;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod model;
pub mod router;
pub mod service;

pub use model::{NewUser, Token, UpdateUser, User};
pub use service::{PgUserStore, UserError, UserStore};
