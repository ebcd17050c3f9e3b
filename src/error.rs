//! Error types for the telemetry simulator.
//!
//! None of these are fatal to the simulation itself: advisory failures are
//! replaced by the offline message, and control errors only reject the
//! operator action that caused them.

use thiserror::Error;

/// Failures talking to the external advisory service
#[derive(Debug, Error)]
pub enum AdvisoryError {
    /// Connection refused, DNS failure, reset, ...
    #[error("transport error: {0}")]
    Transport(String),

    #[error("advisory request timed out after {0}ms")]
    Timeout(u64),

    /// Non-success HTTP status
    #[error("advisory service returned HTTP {0}")]
    Status(u16),

    #[error("empty response from advisory service")]
    EmptyBody,

    /// Body was not valid JSON
    #[error("malformed advisory response: {0}")]
    Malformed(String),

    /// Service answered with an explicit error envelope
    #[error("advisory service error: {0}")]
    Service(String),

    #[error("advisory response carried no text")]
    MissingText,

    #[error("no advisory endpoint configured")]
    NotConfigured,
}

impl AdvisoryError {
    pub fn malformed(err: impl std::fmt::Display) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<reqwest::Error> for AdvisoryError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Rejected operator actions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("controls are disabled: containment lockdown in effect")]
    LockedDown,
}

/// Invalid process configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(key: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            value: value.into(),
            reason: reason.into(),
        }
    }
}
