//! # Financify Config
//!
//! Configuration structures loaded from environment variables:
//!
//! - [`web`]: listener addresses and timeouts
//! - [`auth`]: signing key directory, active key id, issuer, token lifetime
//! - [`database`]: PostgreSQL connection settings
//!
//! Every struct has a `from_env()` constructor and a `from_lookup()`
//! constructor taking any `Fn(&str) -> Option<String>`, which tests use
//! instead of mutating the process environment.
//!
//! # Example
//!
//! ```ignore
//! use financify_config::{AuthConfig, DatabaseConfig, WebConfig};
//!
//! dotenvy::dotenv().ok();
//! let web = WebConfig::from_env();
//! let auth = AuthConfig::from_env();
//! let db = DatabaseConfig::from_env();
//! ```

pub mod auth;
pub mod database;
pub mod web;

pub use auth::AuthConfig;
pub use database::DatabaseConfig;
pub use web::WebConfig;

use std::str::FromStr;

/// Reads `key` through `lookup` and parses it, falling back to `default` when
/// the variable is unset or unparsable.
pub(crate) fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Reads `key` through `lookup`, treating blank values as unset.
pub(crate) fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub(crate) fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[cfg(test)]
pub(crate) fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let pairs: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}
