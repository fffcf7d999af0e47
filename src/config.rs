// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values, and the
//! [`Config`] struct built from them once at startup. The config is passed
//! explicitly to the components that need it (see [`crate::state::AppState`]);
//! nothing reads the environment after startup.
//!
//! A `.env` file in the working directory is loaded first if present.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `API_KEY` | Shared secret required in request bodies | Required |
//! | `SALT` | Salt appended to emails before hashing | Required |
//! | `DATABASE_URL` | `memory:`, `redb://<path>` or a bare file path | `data/recipients.redb` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `RATE_LIMIT_ROUTE` | Per-route limits, e.g. `1/second` | `1/second` |
//! | `RATE_LIMIT_DEFAULT` | Limits applied to every route | `200/day;50/hour` |
//! | `RATE_LIMIT_ENABLED` | Set to `false` to disable rate limiting | `true` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::fmt;

use crate::rate_limit::{Quota, RateLimitConfig};

/// Environment variable name for the shared API secret.
pub const API_KEY_ENV: &str = "API_KEY";

/// Environment variable name for the hash salt.
///
/// Changing the salt changes every recipient hash, which invalidates all
/// unsubscribe links already sent out.
pub const SALT_ENV: &str = "SALT";

/// Environment variable name for the datastore location.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const RATE_LIMIT_ROUTE_ENV: &str = "RATE_LIMIT_ROUTE";
pub const RATE_LIMIT_DEFAULT_ENV: &str = "RATE_LIMIT_DEFAULT";
pub const RATE_LIMIT_ENABLED_ENV: &str = "RATE_LIMIT_ENABLED";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_DATABASE_URL: &str = "data/recipients.redb";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ROUTE_LIMITS: &str = "1/second";
pub const DEFAULT_LIMITS: &str = "200/day;50/hour";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Process-wide configuration, immutable after startup.
#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub salt: String,
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub rate_limit: RateLimitConfig,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let optional = |name: &'static str, default: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let port_raw = optional(PORT_ENV, &DEFAULT_PORT.to_string());
        let port = port_raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name: PORT_ENV,
            value: port_raw.clone(),
        })?;

        let quotas = |name: &'static str, default: &str| {
            let raw = optional(name, default);
            Quota::parse_list(&raw).map_err(|_| ConfigError::Invalid { name, value: raw })
        };

        let enabled_raw = optional(RATE_LIMIT_ENABLED_ENV, "true");
        let enabled = match enabled_raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => {
                return Err(ConfigError::Invalid {
                    name: RATE_LIMIT_ENABLED_ENV,
                    value: enabled_raw,
                })
            }
        };

        Ok(Self {
            api_key: required(API_KEY_ENV)?,
            salt: required(SALT_ENV)?,
            database_url: optional(DATABASE_URL_ENV, DEFAULT_DATABASE_URL),
            host: optional(HOST_ENV, DEFAULT_HOST),
            port,
            rate_limit: RateLimitConfig {
                enabled,
                route: quotas(RATE_LIMIT_ROUTE_ENV, DEFAULT_ROUTE_LIMITS)?,
                default: quotas(RATE_LIMIT_DEFAULT_ENV, DEFAULT_LIMITS)?,
            },
        })
    }

    /// `host:port` string to bind the listener to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("salt", &"<redacted>")
            .field("database_url", &self.database_url)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// Read `LOG_FORMAT`; anything other than `json` means pretty output.
    pub fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        api_key: "secret".into(),
        salt: "pepper".into(),
        database_url: "memory:".into(),
        host: DEFAULT_HOST.into(),
        port: DEFAULT_PORT,
        rate_limit: RateLimitConfig::disabled(),
    }
}
