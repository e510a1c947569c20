//! Token signing configuration.
//!
//! - `AUTH_KEYS_DIR`: directory of Ed25519 PKCS#8 PEM files, one per key id,
//!   named `<kid>.pem` (default `keys`)
//! - `AUTH_ACTIVE_KID`: key id used when a caller does not pick one. Optional
//!   when the directory holds exactly one key.
//! - `AUTH_ISSUER`: `iss` claim written and required (default `financify service`)
//! - `AUTH_TOKEN_TTL_SECS`: lifetime of issued tokens (default 3600)

use std::path::PathBuf;

use crate::{env_lookup, non_empty, parse_or};

pub const DEFAULT_ISSUER: &str = "financify service";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthConfig {
    pub keys_dir: PathBuf,
    pub active_kid: Option<String>,
    pub issuer: String,
    pub token_ttl_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            keys_dir: PathBuf::from("keys"),
            active_kid: None,
            issuer: DEFAULT_ISSUER.to_string(),
            token_ttl_secs: 3600,
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            keys_dir: non_empty(&lookup, "AUTH_KEYS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.keys_dir),
            active_kid: non_empty(&lookup, "AUTH_ACTIVE_KID"),
            issuer: non_empty(&lookup, "AUTH_ISSUER").unwrap_or(defaults.issuer),
            token_ttl_secs: parse_or(&lookup, "AUTH_TOKEN_TTL_SECS", defaults.token_ttl_secs)
                .max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup_from;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::from_lookup(|_| None);
        assert_eq!(config.keys_dir, PathBuf::from("keys"));
        assert_eq!(config.active_kid, None);
        assert_eq!(config.issuer, DEFAULT_ISSUER);
        assert_eq!(config.token_ttl_secs, 3600);
    }

    #[test]
    fn test_blank_active_kid_is_unset() {
        let config = AuthConfig::from_lookup(lookup_from(&[("AUTH_ACTIVE_KID", "  ")]));
        assert_eq!(config.active_kid, None);
    }

    #[test]
    fn test_overrides() {
        let config = AuthConfig::from_lookup(lookup_from(&[
            ("AUTH_KEYS_DIR", "/etc/financify/keys"),
            ("AUTH_ACTIVE_KID", "2024-rotation"),
            ("AUTH_TOKEN_TTL_SECS", "60"),
        ]));
        assert_eq!(config.keys_dir, PathBuf::from("/etc/financify/keys"));
        assert_eq!(config.active_kid.as_deref(), Some("2024-rotation"));
        assert_eq!(config.token_ttl_secs, 60);
    }

    #[test]
    fn test_ttl_never_zero() {
        let config = AuthConfig::from_lookup(lookup_from(&[("AUTH_TOKEN_TTL_SECS", "0")]));
        assert_eq!(config.token_ttl_secs, 1);
    }
}
