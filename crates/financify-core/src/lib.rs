//! # Financify Core
//!
//! Foundational types shared by every Financify crate:
//!
//! - [`errors`]: [`AppError`] and the `{error, fields}` wire body
//! - [`pagination`]: page/limit query parameters
//! - [`password`]: bcrypt hashing and verification
//!
//! # Example
//!
//! ```ignore
//! use financify_core::{AppError, hash_password, verify_password};
//!
//! let hash = hash_password("gophers")?;
//! assert!(verify_password("gophers", &hash)?);
//!
//! let err = AppError::not_found(anyhow::anyhow!("user not found"));
//! ```

pub mod errors;
pub mod pagination;
pub mod password;

pub use errors::{AppError, ErrorResponse, FieldError, INTERNAL_ERROR_MESSAGE};
pub use pagination::PaginationParams;
pub use password::{hash_password, hash_password_with_cost, verify_password};
