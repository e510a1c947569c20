//! Password hashing and verification using bcrypt.
//!
//! Stored hashes embed their own salt and cost, so verification must go
//! through [`verify_password`]. Hashing the presented password again and
//! comparing bytes can never match, because every hash gets a fresh salt.

use anyhow::Context;
use bcrypt::{DEFAULT_COST, hash, verify};

use crate::errors::AppError;

/// Hashes `password` with bcrypt at [`DEFAULT_COST`].
pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash_password_with_cost(password, DEFAULT_COST)
}

/// Hashes `password` with an explicit bcrypt cost (4..=31).
///
/// Low costs are only meant for tests and local tooling.
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost)
        .context("Failed to hash password")
        .map_err(AppError::internal)
}

/// Checks `password` against a stored bcrypt `hash`.
///
/// Returns `Ok(false)` on mismatch and an error only when `hash` is not a
/// bcrypt hash at all.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .context("Failed to verify password")
        .map_err(AppError::internal)
}
