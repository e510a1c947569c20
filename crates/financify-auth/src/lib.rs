//! # Financify Auth
//!
//! Signed-token authentication for the Financify API.
//!
//! - [`claims`]: [`Claims`] and the any-of role predicate
//! - [`keys`]: [`KeyRegistry`], the immutable kid → Ed25519 key map
//! - [`jwt`]: [`Authenticator`], which issues and validates tokens
//! - [`error`]: [`AuthError`] and the internal [`TokenError`] reasons
//!
//! # Example
//!
//! ```ignore
//! use financify_auth::{Authenticator, KeyRegistry, generate_signing_key, ROLE_ADMIN};
//!
//! let mut keys = KeyRegistry::builder();
//! keys.insert("2024", &generate_signing_key())?;
//! let auth = Authenticator::new(keys.build()?, "financify service", 3600);
//!
//! let claims = auth.claims_for("u1", vec![ROLE_ADMIN.to_string()], chrono::Utc::now());
//! let token = auth.issue("2024", &claims)?;
//! assert!(auth.validate(&token)?.authorize(&[ROLE_ADMIN]));
//! ```

pub mod claims;
pub mod error;
pub mod jwt;
pub mod keys;

pub use claims::{Claims, KNOWN_ROLES, ROLE_ADMIN, ROLE_USER};
pub use error::{AuthError, TokenError};
pub use jwt::Authenticator;
pub use keys::{KeyRegistry, KeyRegistryBuilder, encode_pem, generate_signing_key};
