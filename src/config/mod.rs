//! Typed configuration from environment variables.
//!
//! Loads once at startup and fails fast on malformed values. Every setting
//! has a default, so an empty environment is valid.

use crate::error::{Error, Result};
use crate::model::NO_TIMEOUT;
use crate::storage::DEFAULT_EVENT_CAPACITY;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    /// How often the coordinator expires timed-out challenges.
    pub sweep_interval: Duration,
    /// Timeout applied to challenges submitted without one, in
    /// milliseconds. `-1` leaves them without a timeout.
    pub default_timeout_ms: i64,
    /// How long a solved, skipped or timed-out challenge stays queryable.
    pub retention: Duration,
    /// Events kept in the in-memory log.
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            otel_endpoint: None,
            log_level: "info".to_string(),
            sweep_interval: Duration::from_millis(1_000),
            default_timeout_ms: NO_TIMEOUT,
            retention: Duration::from_secs(300),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            sweep_interval: match optional_var::<u64>("CAPTCHA_SWEEP_INTERVAL_MS")? {
                Some(0) => {
                    return Err(Error::Config(
                        "CAPTCHA_SWEEP_INTERVAL_MS must be positive".to_string(),
                    ));
                }
                Some(ms) => Duration::from_millis(ms),
                None => defaults.sweep_interval,
            },
            default_timeout_ms: match optional_var::<i64>("CAPTCHA_DEFAULT_TIMEOUT_MS")? {
                Some(ms) if ms < NO_TIMEOUT => {
                    return Err(Error::Config(format!(
                        "CAPTCHA_DEFAULT_TIMEOUT_MS must be -1 or positive, got {ms}"
                    )));
                }
                Some(ms) => ms,
                None => defaults.default_timeout_ms,
            },
            retention: optional_var::<u64>("CAPTCHA_RETENTION_MS")?
                .map_or(defaults.retention, Duration::from_millis),
            event_capacity: match optional_var::<usize>("CAPTCHA_EVENT_CAPACITY")? {
                Some(0) => {
                    return Err(Error::Config(
                        "CAPTCHA_EVENT_CAPACITY must be positive".to_string(),
                    ));
                }
                Some(n) => n,
                None => defaults.event_capacity,
            },
        })
    }
}

fn optional_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid {name}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}
