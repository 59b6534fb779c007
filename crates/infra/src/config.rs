//! Process configuration loaded from the environment.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `BIND_ADDR` | `0.0.0.0:8080` |
//! | `JWT_SECRET` | required |
//! | `EXPIRES_IN` | `1d` (humantime, or bare seconds) |
//! | `DATABASE_URL` | unset: in-memory store |
//! | `DATABASE_MAX_CONNECTIONS` | `5` |
//! | `REDIS_URL` | unset: in-memory bus |
//! | `LOG_QUEUE` | `usergate:logs` |
//! | `BCRYPT_COST` | `8` |
//! | `MAX_PAGE_SIZE` | `100` |

use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

use usergate_auth::{DEFAULT_COST, SigningSecret};
use usergate_core::pagination::DEFAULT_MAX_LIMIT;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_EXPIRES_IN: &str = "1d";
pub const DEFAULT_LOG_QUEUE: &str = "usergate:logs";
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: SigningSecret,
    pub token_ttl: chrono::Duration,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub redis_url: Option<String>,
    pub log_queue: String,
    pub bcrypt_cost: u32,
    pub max_page_size: u32,
}

impl AppConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is normal outside development.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let expires_in = get("EXPIRES_IN").unwrap_or_else(|| DEFAULT_EXPIRES_IN.to_string());
        let token_ttl = parse_ttl(&expires_in)?;

        let bind_addr: SocketAddr = parse_or("BIND_ADDR", get("BIND_ADDR"), DEFAULT_BIND_ADDR.parse().ok())?;

        let database_max_connections = parse_or(
            "DATABASE_MAX_CONNECTIONS",
            get("DATABASE_MAX_CONNECTIONS"),
            Some(DEFAULT_DATABASE_MAX_CONNECTIONS),
        )?;
        if database_max_connections == 0 {
            return Err(invalid("DATABASE_MAX_CONNECTIONS", "must be at least 1"));
        }

        let bcrypt_cost = parse_or("BCRYPT_COST", get("BCRYPT_COST"), Some(DEFAULT_COST))?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(invalid("BCRYPT_COST", "must be between 4 and 31"));
        }

        let max_page_size = parse_or("MAX_PAGE_SIZE", get("MAX_PAGE_SIZE"), Some(DEFAULT_MAX_LIMIT))?;
        if max_page_size == 0 {
            return Err(invalid("MAX_PAGE_SIZE", "must be at least 1"));
        }

        Ok(Self {
            bind_addr,
            jwt_secret: SigningSecret::new(jwt_secret),
            token_ttl,
            database_url: get("DATABASE_URL"),
            database_max_connections,
            redis_url: get("REDIS_URL"),
            log_queue: get("LOG_QUEUE").unwrap_or_else(|| DEFAULT_LOG_QUEUE.to_string()),
            bcrypt_cost,
            max_page_size,
        })
    }
}

fn invalid(key: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        message: message.into(),
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: Option<T>) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    match raw {
        Some(raw) => raw.parse().map_err(|e: T::Err| invalid(key, e.to_string())),
        None => default.ok_or(ConfigError::Missing(key)),
    }
}

/// `"3600"` is seconds; anything else goes through humantime (`"1d"`, `"15m"`).
fn parse_ttl(raw: &str) -> Result<chrono::Duration, ConfigError> {
    let std = match raw.parse::<u64>() {
        Ok(secs) => std::time::Duration::from_secs(secs),
        Err(_) => humantime::parse_duration(raw).map_err(|e| invalid("EXPIRES_IN", e.to_string()))?,
    };

    if std.is_zero() {
        return Err(invalid("EXPIRES_IN", "must be greater than zero"));
    }

    chrono::Duration::from_std(std).map_err(|e| invalid("EXPIRES_IN", e.to_string()))
}
