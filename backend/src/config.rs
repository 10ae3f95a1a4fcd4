use std::{env, fmt::Display, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

use crate::retry::RetryPolicy;

pub const DEFAULT_RECENT_LIMIT: usize = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid { key: String, value: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Redis,
    /// Process-local store, for a single replica without Redis.
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreKind::Redis),
            "memory" => Ok(StoreKind::Memory),
            other => Err(format!("unknown store {other}, expected redis or memory")),
        }
    }
}

/// Runtime settings, read once at startup from the environment. Binding
/// address and port are Rocket's own (`ROCKET_ADDRESS`, `ROCKET_PORT`).
#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreKind,
    pub redis_url: String,
    pub public_base_url: Option<String>,
    pub retry: RetryPolicy,
    pub recent_limit: usize,
    pub cors_origin: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let redis_url = match var("REDIS_URL") {
            Some(url) => url,
            None => {
                let host: String = try_load(&var, "REDIS_HOST", "localhost")?;
                let port: u16 = try_load(&var, "REDIS_PORT", "6379")?;
                format!("redis://{host}:{port}/0")
            }
        };

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: try_load(&var, "STORE_RETRY_ATTEMPTS", &defaults.max_attempts.to_string())?,
            base_delay: Duration::from_millis(try_load(
                &var,
                "STORE_RETRY_BASE_MS",
                &defaults.base_delay.as_millis().to_string(),
            )?),
            max_delay: Duration::from_millis(try_load(
                &var,
                "STORE_RETRY_MAX_MS",
                &defaults.max_delay.as_millis().to_string(),
            )?),
        };
        if retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "STORE_RETRY_ATTEMPTS".into(),
                value: "0".into(),
                reason: "at least one attempt is required".into(),
            });
        }

        let public_base_url = var("PUBLIC_BASE_URL").map(|url| url.trim_end_matches('/').to_string());
        if let Some(url) = &public_base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid {
                    key: "PUBLIC_BASE_URL".into(),
                    value: url.clone(),
                    reason: "must start with http:// or https://".into(),
                });
            }
        }

        Ok(Self {
            store: try_load(&var, "SURVEY_STORE", "redis")?,
            redis_url,
            public_base_url,
            retry,
            recent_limit: try_load(&var, "RECENT_SURVEYS_LIMIT", &DEFAULT_RECENT_LIMIT.to_string())?,
            cors_origin: var("CORS_ALLOWED_ORIGIN"),
        })
    }
}

fn try_load<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key: key.to_string(),
            value,
            reason: e.to_string(),
        }
    })
}
