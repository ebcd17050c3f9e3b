//! Process configuration, read from the environment.
//!
//! - `REACTOR_TICK_MS` simulation period (default 1000)
//! - `REACTOR_HISTORY_CAPACITY` readings kept for charts (default 30, at most 10000)
//! - `REACTOR_SCRAM_WINDOW_MS` SCRAM pulse length (default 5000)
//! - `REACTOR_SEED` fixed physics RNG seed (default: OS entropy)
//! - `ADVISORY_URL` advisory endpoint (default: none, advisory stays offline)
//! - `ADVISORY_API_KEY` sent as the `key` query parameter when set
//! - `ADVISORY_ENVELOPE` `raw` or `gemini` (default `raw`)
//! - `ADVISORY_INTERVAL_MS` advisory poll period (default 10000)
//! - `ADVISORY_TIMEOUT_MS` per-request timeout (default 4000)

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::advisory::Envelope;
use crate::error::ConfigError;
use crate::history::{DEFAULT_CAPACITY, MAX_CAPACITY};
use crate::reactor::constants::SCRAM_WINDOW_MS;

pub const DEFAULT_TICK_MS: u64 = 1_000;
pub const DEFAULT_ADVISORY_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_ADVISORY_TIMEOUT_MS: u64 = 4_000;

#[derive(Debug, Clone, PartialEq)]
pub struct AdvisoryConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub envelope: Envelope,
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            envelope: Envelope::Raw,
            interval: Duration::from_millis(DEFAULT_ADVISORY_INTERVAL_MS),
            timeout: Duration::from_millis(DEFAULT_ADVISORY_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub tick_period: Duration,
    pub history_capacity: usize,
    pub scram_window: Duration,
    pub seed: Option<u64>,
    pub advisory: AdvisoryConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(DEFAULT_TICK_MS),
            history_capacity: DEFAULT_CAPACITY,
            scram_window: Duration::from_millis(SCRAM_WINDOW_MS),
            seed: None,
            advisory: AdvisoryConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an explicit key/value map
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let tick_ms = parse_or(&get, "REACTOR_TICK_MS", DEFAULT_TICK_MS)?;
        let capacity = parse_or(&get, "REACTOR_HISTORY_CAPACITY", DEFAULT_CAPACITY)?;
        let scram_ms = parse_or(&get, "REACTOR_SCRAM_WINDOW_MS", SCRAM_WINDOW_MS)?;
        let seed = get("REACTOR_SEED")
            .map(|v| {
                v.parse::<u64>()
                    .map_err(|e| ConfigError::invalid("REACTOR_SEED", v.clone(), e.to_string()))
            })
            .transpose()?;

        let interval_ms =
            parse_or(&get, "ADVISORY_INTERVAL_MS", DEFAULT_ADVISORY_INTERVAL_MS)?;
        let timeout_ms = parse_or(&get, "ADVISORY_TIMEOUT_MS", DEFAULT_ADVISORY_TIMEOUT_MS)?;
        let envelope = match get("ADVISORY_ENVELOPE") {
            Some(v) => v
                .parse::<Envelope>()
                .map_err(|reason| ConfigError::invalid("ADVISORY_ENVELOPE", v.clone(), reason))?,
            None => Envelope::Raw,
        };

        require_nonzero("REACTOR_TICK_MS", tick_ms)?;
        require_nonzero("REACTOR_HISTORY_CAPACITY", capacity as u64)?;
        if capacity > MAX_CAPACITY {
            return Err(ConfigError::invalid(
                "REACTOR_HISTORY_CAPACITY",
                capacity.to_string(),
                format!("must be at most {MAX_CAPACITY}"),
            ));
        }
        require_nonzero("REACTOR_SCRAM_WINDOW_MS", scram_ms)?;
        require_nonzero("ADVISORY_INTERVAL_MS", interval_ms)?;
        require_nonzero("ADVISORY_TIMEOUT_MS", timeout_ms)?;

        Ok(Self {
            tick_period: Duration::from_millis(tick_ms),
            history_capacity: capacity,
            scram_window: Duration::from_millis(scram_ms),
            seed,
            advisory: AdvisoryConfig {
                url: get("ADVISORY_URL"),
                api_key: get("ADVISORY_API_KEY"),
                envelope,
                interval: Duration::from_millis(interval_ms),
                timeout: Duration::from_millis(timeout_ms),
            },
        })
    }
}

fn parse_or<G, T>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(v) => v
            .parse::<T>()
            .map_err(|e| ConfigError::invalid(key, v.clone(), e.to_string())),
        None => Ok(default),
    }
}

fn require_nonzero(key: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(key, "0", "must be greater than zero"));
    }
    Ok(())
}
