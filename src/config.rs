//! Process configuration.
//!
//! Read once at startup from the environment (after `.env` has been loaded).
//! Any problem is reported as a [`ConfigError`] so the server can refuse to
//! start instead of failing on the first request.
//!
//! # Environment Variables
//!
//! - `APP_USERNAME`: username of the single account (required)
//! - `HASHED_PASSWORD`: bcrypt hash of that account's password (required)
//! - `APP_FULL_NAME`: display name of the account (optional)
//! - `SECRET_KEY`: HMAC signing secret (required)
//! - `ALGORITHM`: `HS256`, `HS384` or `HS512` (default: `HS256`)
//! - `ACCESS_TOKEN_EXPIRE_MINUTES`: token lifetime (default: `15`)
//! - `HOST`: bind address (default: `0.0.0.0`)
//! - `PORT`: bind port (default: `8000`)

use std::str::FromStr;

use chrono::Duration;
use jsonwebtoken::Algorithm;
use thiserror::Error;

use crate::models::Account;
use crate::password::is_bcrypt_hash;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
}

impl ConfigError {
    fn invalid(name: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// Everything the token authority needs. Immutable after startup.
#[derive(Clone)]
pub struct AuthConfig {
    pub account: Account,
    pub secret: String,
    pub algorithm: Algorithm,
    pub ttl: Duration,
}

#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub const DEFAULT_HOST: &'static str = "0.0.0.0";
    pub const DEFAULT_PORT: u16 = 8000;

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let port = match lookup("PORT") {
            Some(value) => value.parse::<u16>().map_err(|_| {
                ConfigError::invalid("PORT", format!("'{value}' is not a valid port number"))
            })?,
            None => Self::DEFAULT_PORT,
        };
        let auth = AuthConfig::from_lookup(&lookup)?;

        Ok(Self { host, port, auth })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl AuthConfig {
    pub const DEFAULT_ALGORITHM: Algorithm = Algorithm::HS256;
    pub const DEFAULT_TTL_MINUTES: i64 = 15;

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let username = required(&lookup, "APP_USERNAME")?;
        let password_hash = required(&lookup, "HASHED_PASSWORD")?;
        if !is_bcrypt_hash(&password_hash) {
            return Err(ConfigError::invalid(
                "HASHED_PASSWORD",
                "not a bcrypt hash",
            ));
        }
        let full_name = lookup("APP_FULL_NAME").filter(|name| !name.is_empty());
        let secret = required(&lookup, "SECRET_KEY")?;
        let algorithm = match lookup("ALGORITHM") {
            Some(value) => parse_algorithm(&value)?,
            None => Self::DEFAULT_ALGORITHM,
        };
        let ttl = parse_ttl(lookup("ACCESS_TOKEN_EXPIRE_MINUTES"))?;

        Ok(Self {
            account: Account {
                username,
                full_name,
                password_hash,
            },
            secret,
            algorithm,
            ttl,
        })
    }
}

fn required<F>(lookup: &F, name: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(name).ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::invalid(name, "must not be empty"));
    }
    Ok(value)
}

/// Only the shared-secret HMAC family can be driven by `SECRET_KEY`.
fn parse_algorithm(value: &str) -> Result<Algorithm, ConfigError> {
    match Algorithm::from_str(value.trim()) {
        Ok(algorithm @ (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)) => Ok(algorithm),
        Ok(_) => Err(ConfigError::invalid(
            "ALGORITHM",
            format!("'{value}' is not an HMAC algorithm (use HS256, HS384 or HS512)"),
        )),
        Err(_) => Err(ConfigError::invalid(
            "ALGORITHM",
            format!("'{value}' is not a known algorithm"),
        )),
    }
}

fn parse_ttl(value: Option<String>) -> Result<Duration, ConfigError> {
    const NAME: &str = "ACCESS_TOKEN_EXPIRE_MINUTES";

    let minutes = match value {
        Some(value) => value
            .trim()
            .parse::<i64>()
            .map_err(|_| ConfigError::invalid(NAME, format!("'{value}' is not an integer")))?,
        None => AuthConfig::DEFAULT_TTL_MINUTES,
    };
    if minutes <= 0 {
        return Err(ConfigError::invalid(NAME, "must be positive"));
    }
    Duration::try_minutes(minutes).ok_or_else(|| ConfigError::invalid(NAME, "out of range"))
}
