//! Engine configuration.
//!
//! Loaded from environment variables with defaults, or from JSON. Every
//! field is optional on input; missing values fall back to the defaults
//! below.
//!
//! | Variable | Default |
//! |---|---|
//! | `UNIT_RESERVE_LOCK_WAIT_MS` | 10000 |
//! | `UNIT_RESERVE_LOCK_LEASE_MS` | 30000 |
//! | `UNIT_RESERVE_RETRY_ATTEMPTS` | 3 |
//! | `UNIT_RESERVE_RETRY_BASE_DELAY_MS` | 50 |
//! | `UNIT_RESERVE_RETRY_MAX_DELAY_MS` | 2000 |
//! | `UNIT_RESERVE_RESERVATION_TIMEOUT_MINUTES` | 15 |
//! | `UNIT_RESERVE_TEMP_ORDER_TIMEOUT_MINUTES` | 30 |
//! | `UNIT_RESERVE_CART_SESSION_TIMEOUT_MINUTES` | 30 |
//! | `UNIT_RESERVE_SWEEP_INTERVAL_SECS` | 300 |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Tunables for locking, retrying and expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long a caller waits for a variant lock.
    pub lock_wait_ms: u64,
    /// Upper bound on how long a variant lock is held.
    pub lock_lease_ms: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Age after which any reservation is released by the sweeper.
    pub reservation_timeout_minutes: u64,
    /// Age after which a temporary pre-order reservation is released.
    pub temp_order_timeout_minutes: u64,
    /// Age after which a cart-session reservation is released.
    pub cart_session_timeout_minutes: u64,
    pub sweep_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_wait_ms: 10_000,
            lock_lease_ms: 30_000,
            retry_attempts: 3,
            retry_base_delay_ms: 50,
            retry_max_delay_ms: 2_000,
            reservation_timeout_minutes: 15,
            temp_order_timeout_minutes: 30,
            cart_session_timeout_minutes: 30,
            sweep_interval_secs: 300,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

impl EngineConfig {
    /// Load configuration from `UNIT_RESERVE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            lock_wait_ms: env_or("UNIT_RESERVE_LOCK_WAIT_MS", defaults.lock_wait_ms)?,
            lock_lease_ms: env_or("UNIT_RESERVE_LOCK_LEASE_MS", defaults.lock_lease_ms)?,
            retry_attempts: env_or("UNIT_RESERVE_RETRY_ATTEMPTS", defaults.retry_attempts)?,
            retry_base_delay_ms: env_or(
                "UNIT_RESERVE_RETRY_BASE_DELAY_MS",
                defaults.retry_base_delay_ms,
            )?,
            retry_max_delay_ms: env_or(
                "UNIT_RESERVE_RETRY_MAX_DELAY_MS",
                defaults.retry_max_delay_ms,
            )?,
            reservation_timeout_minutes: env_or(
                "UNIT_RESERVE_RESERVATION_TIMEOUT_MINUTES",
                defaults.reservation_timeout_minutes,
            )?,
            temp_order_timeout_minutes: env_or(
                "UNIT_RESERVE_TEMP_ORDER_TIMEOUT_MINUTES",
                defaults.temp_order_timeout_minutes,
            )?,
            cart_session_timeout_minutes: env_or(
                "UNIT_RESERVE_CART_SESSION_TIMEOUT_MINUTES",
                defaults.cart_session_timeout_minutes,
            )?,
            sweep_interval_secs: env_or(
                "UNIT_RESERVE_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_lease_ms == 0 {
            return Err(ConfigError::Invalid("lock lease must be positive".into()));
        }
        if self.retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry attempts must be at least 1".into(),
            ));
        }
        if self.retry_max_delay_ms < self.retry_base_delay_ms {
            return Err(ConfigError::Invalid(
                "retry max delay is below the base delay".into(),
            ));
        }
        if self.reservation_timeout_minutes == 0
            || self.temp_order_timeout_minutes == 0
            || self.cart_session_timeout_minutes == 0
        {
            return Err(ConfigError::Invalid(
                "reservation timeouts must be positive".into(),
            ));
        }
        for (key, value) in [
            ("reservation_timeout_minutes", self.reservation_timeout_minutes),
            ("temp_order_timeout_minutes", self.temp_order_timeout_minutes),
            ("cart_session_timeout_minutes", self.cart_session_timeout_minutes),
        ] {
            if try_minutes(value).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "{} is out of range: {}",
                    key, value
                )));
            }
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid("sweep interval must be positive".into()));
        }
        Ok(())
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    pub fn lock_lease(&self) -> Duration {
        Duration::from_millis(self.lock_lease_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
        .with_max_delay(Duration::from_millis(self.retry_max_delay_ms))
    }

    pub fn reservation_timeout(&self) -> chrono::Duration {
        minutes(self.reservation_timeout_minutes)
    }

    pub fn temp_order_timeout(&self) -> chrono::Duration {
        minutes(self.temp_order_timeout_minutes)
    }

    pub fn cart_session_timeout(&self) -> chrono::Duration {
        minutes(self.cart_session_timeout_minutes)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn try_minutes(value: u64) -> Option<chrono::Duration> {
    i64::try_from(value)
        .ok()
        .and_then(chrono::Duration::try_minutes)
}

/// Saturates at `chrono::Duration::MAX` for values `validate` would reject.
fn minutes(value: u64) -> chrono::Duration {
    try_minutes(value).unwrap_or(chrono::Duration::MAX)
}
