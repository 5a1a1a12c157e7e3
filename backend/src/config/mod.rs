//! Application configuration management

use std::env;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};

/// Upper bound for `SUBSCRIBER_QUEUE_CAPACITY`. Every subscriber preallocates
/// its whole queue, rounded up to a power of two.
pub const MAX_SUBSCRIBER_QUEUE_CAPACITY: usize = 1024;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Interface to bind
    pub host: String,

    /// Server port
    pub port: u16,

    /// SQLite connection URL, e.g. `sqlite://data/catalog.db`
    pub database_url: String,

    /// Maximum pooled store connections
    pub database_max_connections: u32,

    /// Secret used to sign and verify bearer tokens
    pub jwt_secret: String,

    /// Token lifetime in seconds
    pub token_lifetime_secs: i64,

    /// Reference password every registered user logs in with
    pub default_user_password: String,

    /// Bcrypt cost factor used when hashing the reference password
    pub bcrypt_cost: u32,

    /// Bound of each subscriber's outbound event queue (rounded up to a power of two)
    pub subscriber_queue_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Missing or malformed required values are fatal.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET is required")?;
        let jwt_secret = jwt_secret.trim().to_string();
        if jwt_secret.is_empty() {
            return Err(anyhow!("JWT_SECRET must not be empty"));
        }

        let database_url = lookup("DATABASE_URL").context("DATABASE_URL is required")?;
        if !database_url.starts_with("sqlite:") {
            return Err(anyhow!(
                "DATABASE_URL must be a sqlite: URL, got '{}'",
                database_url
            ));
        }

        let subscriber_queue_capacity: usize =
            parse_or(&lookup, "SUBSCRIBER_QUEUE_CAPACITY", 16)?;
        if subscriber_queue_capacity == 0 {
            return Err(anyhow!("SUBSCRIBER_QUEUE_CAPACITY must be at least 1"));
        }
        if subscriber_queue_capacity > MAX_SUBSCRIBER_QUEUE_CAPACITY {
            return Err(anyhow!(
                "SUBSCRIBER_QUEUE_CAPACITY must be at most {}, got {}",
                MAX_SUBSCRIBER_QUEUE_CAPACITY,
                subscriber_queue_capacity
            ));
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 4000)?,
            database_url,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            jwt_secret,
            token_lifetime_secs: parse_or(&lookup, "TOKEN_LIFETIME_SECS", 24 * 60 * 60)?,
            default_user_password: lookup("DEFAULT_USER_PASSWORD")
                .unwrap_or_else(|| "secret".to_string()),
            bcrypt_cost: parse_or(&lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            subscriber_queue_capacity,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: '{}'", key, raw)),
        None => Ok(default),
    }
}
