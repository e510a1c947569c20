//! HTTP listener configuration.
//!
//! - `API_HOST`: address of the public API (default `0.0.0.0:3000`)
//! - `DEBUG_HOST`: address of the debug/metrics listener (default `0.0.0.0:4000`)
//! - `REQUEST_TIMEOUT_SECS`: per-request timeout (default 5)
//! - `SHUTDOWN_TIMEOUT_SECS`: grace period for in-flight requests once shutdown starts (default 5)

use std::time::Duration;

use crate::{env_lookup, non_empty, parse_or};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebConfig {
    pub api_host: String,
    pub debug_host: String,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0:3000".to_string(),
            debug_host: "0.0.0.0:4000".to_string(),
            request_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl WebConfig {
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
            api_host: non_empty(&lookup, "API_HOST").unwrap_or(defaults.api_host),
            debug_host: non_empty(&lookup, "DEBUG_HOST").unwrap_or(defaults.debug_host),
            request_timeout: Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 5)),
            shutdown_timeout: Duration::from_secs(parse_or(&lookup, "SHUTDOWN_TIMEOUT_SECS", 5)),
        }
    }
}
