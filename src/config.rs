// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and [`AppConfig`], loaded once at
//! startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWT_SECRET` | HS256 signing secret | insecure development value |
//! | `INTERNAL_TOKEN` | Shared secret for internal service calls | unset (internal calls rejected) |
//! | `OAUTH_STATE_EXPIRATION_MINUTES` | OAuth state lifetime | `10` |
//! | `SESSION_EXPIRATION_HOURS` | Sliding session lifetime | `24` |
//! | `GITHUB_CLIENT_ID` | GitHub OAuth app id | unset (provider disabled) |
//! | `GITHUB_CLIENT_SECRET` | GitHub OAuth app secret | unset (provider disabled) |
//! | `GITHUB_REDIRECT_URL` | Default OAuth callback URL | empty |
//! | `REDIS_URL` | External key/value store (`redis` feature) | unset (in-memory) |
//! | `MEMORY_STORE_CAPACITY` | Max keys of the in-memory store | `100000` |
//! | `RBAC_POLICY_PATH` | JSON role policy file | built-in table |
//! | `RBAC_FAIL_OPEN` | Admit protected calls if the policy failed to load | `false` |
//! | `REQUEST_TIMEOUT_SECS` | Per-call deadline | `10` |
//! | `SEED_ADMIN_EMAIL` | Admin password account created at startup | unset |
//! | `SEED_ADMIN_PASSWORD` | Password for the seeded admin | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::providers::github::GithubConfig;
use crate::storage::memory::DEFAULT_CAPACITY;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const INTERNAL_TOKEN_ENV: &str = "INTERNAL_TOKEN";
pub const OAUTH_STATE_EXPIRATION_ENV: &str = "OAUTH_STATE_EXPIRATION_MINUTES";
pub const SESSION_EXPIRATION_ENV: &str = "SESSION_EXPIRATION_HOURS";
pub const GITHUB_CLIENT_ID_ENV: &str = "GITHUB_CLIENT_ID";
pub const GITHUB_CLIENT_SECRET_ENV: &str = "GITHUB_CLIENT_SECRET";
pub const GITHUB_REDIRECT_URL_ENV: &str = "GITHUB_REDIRECT_URL";
pub const REDIS_URL_ENV: &str = "REDIS_URL";
pub const MEMORY_STORE_CAPACITY_ENV: &str = "MEMORY_STORE_CAPACITY";
pub const RBAC_POLICY_PATH_ENV: &str = "RBAC_POLICY_PATH";
pub const RBAC_FAIL_OPEN_ENV: &str = "RBAC_FAIL_OPEN";
pub const REQUEST_TIMEOUT_ENV: &str = "REQUEST_TIMEOUT_SECS";
pub const SEED_ADMIN_EMAIL_ENV: &str = "SEED_ADMIN_EMAIL";
pub const SEED_ADMIN_PASSWORD_ENV: &str = "SEED_ADMIN_PASSWORD";

/// Environment variable name for log output format.
///
/// `json` for structured production logs, anything else for human-readable
/// output.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Signing secret used when `JWT_SECRET` is unset. Startup logs a warning.
pub const DEFAULT_JWT_SECRET: &str = "default_jwt_secret_change_in_production";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_OAUTH_STATE_MINUTES: u64 = 10;
const DEFAULT_SESSION_HOURS: u64 = 24;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} is set but {1} is missing")]
    Incomplete(&'static str, &'static str),
}

/// Admin password account created at startup.
#[derive(Clone)]
pub struct SeedAdmin {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for SeedAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedAdmin")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// True when `jwt_secret` is the built-in development value.
    pub jwt_secret_is_default: bool,
    pub internal_token: String,
    pub oauth_state_ttl: Duration,
    pub session_ttl: Duration,
    pub github: Option<GithubConfig>,
    pub redis_url: Option<String>,
    pub memory_store_capacity: usize,
    pub policy_path: Option<PathBuf>,
    pub policy_fail_open: bool,
    pub request_timeout: Duration,
    pub seed_admin: Option<SeedAdmin>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret_is_default", &self.jwt_secret_is_default)
            .field("internal_token_set", &!self.internal_token.is_empty())
            .field("oauth_state_ttl", &self.oauth_state_ttl)
            .field("session_ttl", &self.session_ttl)
            .field("github", &self.github.as_ref().map(|g| &g.client_id))
            .field("redis", &self.redis_url.is_some())
            .field("memory_store_capacity", &self.memory_store_capacity)
            .field("policy_path", &self.policy_path)
            .field("policy_fail_open", &self.policy_fail_open)
            .field("request_timeout", &self.request_timeout)
            .field("seed_admin", &self.seed_admin)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Whether sessions go to Redis while identities stay in process memory.
    ///
    /// Such sessions survive a restart or reach another instance, but the
    /// user they name does not, so token exchange answers `unauthenticated`.
    pub fn sessions_outlive_identities(&self) -> bool {
        cfg!(feature = "redis") && self.redis_url.is_some()
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let host = var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match var(PORT_ENV) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: PORT_ENV,
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    var: HOST_ENV,
                    value: host.clone(),
                    reason: e.to_string(),
                })?;

        let (jwt_secret, jwt_secret_is_default) = match var(JWT_SECRET_ENV) {
            Some(secret) => (secret, false),
            None => (DEFAULT_JWT_SECRET.to_string(), true),
        };

        let github = match (var(GITHUB_CLIENT_ID_ENV), var(GITHUB_CLIENT_SECRET_ENV)) {
            (Some(client_id), Some(client_secret)) => Some(GithubConfig {
                client_id,
                client_secret,
                redirect_url: var(GITHUB_REDIRECT_URL_ENV).unwrap_or_default(),
            }),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete(
                    GITHUB_CLIENT_ID_ENV,
                    GITHUB_CLIENT_SECRET_ENV,
                ))
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete(
                    GITHUB_CLIENT_SECRET_ENV,
                    GITHUB_CLIENT_ID_ENV,
                ))
            }
            (None, None) => None,
        };

        let seed_admin = match (var(SEED_ADMIN_EMAIL_ENV), var(SEED_ADMIN_PASSWORD_ENV)) {
            (Some(email), Some(password)) => Some(SeedAdmin { email, password }),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete(
                    SEED_ADMIN_EMAIL_ENV,
                    SEED_ADMIN_PASSWORD_ENV,
                ))
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete(
                    SEED_ADMIN_PASSWORD_ENV,
                    SEED_ADMIN_EMAIL_ENV,
                ))
            }
            (None, None) => None,
        };

        let policy_fail_open = match var(RBAC_FAIL_OPEN_ENV) {
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::Invalid {
                var: RBAC_FAIL_OPEN_ENV,
                value: raw.clone(),
                reason: "expected true or false".to_string(),
            })?,
            None => false,
        };

        let capacity = positive_or(
            var(MEMORY_STORE_CAPACITY_ENV),
            MEMORY_STORE_CAPACITY_ENV,
            DEFAULT_CAPACITY as i64,
        )?;

        Ok(Self {
            bind_addr,
            jwt_secret,
            jwt_secret_is_default,
            internal_token: var(INTERNAL_TOKEN_ENV).unwrap_or_default(),
            oauth_state_ttl: duration_or(
                var(OAUTH_STATE_EXPIRATION_ENV),
                OAUTH_STATE_EXPIRATION_ENV,
                DEFAULT_OAUTH_STATE_MINUTES as i64,
                60,
            )?,
            session_ttl: duration_or(
                var(SESSION_EXPIRATION_ENV),
                SESSION_EXPIRATION_ENV,
                DEFAULT_SESSION_HOURS as i64,
                3600,
            )?,
            github,
            redis_url: var(REDIS_URL_ENV),
            memory_store_capacity: capacity as usize,
            policy_path: var(RBAC_POLICY_PATH_ENV).map(PathBuf::from),
            policy_fail_open,
            request_timeout: duration_or(
                var(REQUEST_TIMEOUT_ENV),
                REQUEST_TIMEOUT_ENV,
                DEFAULT_REQUEST_TIMEOUT_SECS as i64,
                1,
            )?,
            seed_admin,
        })
    }
}

/// Parse an integer setting; zero or negative means the default.
fn positive_or(raw: Option<String>, var: &'static str, default: i64) -> Result<u64, ConfigError> {
    let value = match raw {
        Some(raw) => raw.trim().parse::<i64>().map_err(|e| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        })?,
        None => default,
    };
    let value = if value > 0 { value } else { default };
    Ok(value as u64)
}

/// Parse a duration counted in units of `unit_secs` seconds.
fn duration_or(
    raw: Option<String>,
    var: &'static str,
    default: i64,
    unit_secs: u64,
) -> Result<Duration, ConfigError> {
    let shown = raw.clone().unwrap_or_default();
    let units = positive_or(raw, var, default)?;
    units
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Invalid {
            var,
            value: shown,
            reason: "value too large".to_string(),
        })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
