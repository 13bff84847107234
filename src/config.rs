//! Session and service configuration.
//!
//! [`DebateConfig`] holds the per-session rules (iteration cap, terminating
//! participants). [`ServiceConfig`] holds the endpoint settings shared by the
//! completion and Assistants clients, and is usually read from the
//! environment:
//!
//! | Variable                             | Default                     |
//! |--------------------------------------|-----------------------------|
//! | `SYMPOSIUM_API_BASE`                 | `https://api.openai.com/v1` |
//! | `SYMPOSIUM_API_KEY` / `OPENAI_API_KEY` | none                      |
//! | `SYMPOSIUM_MODEL`                    | required                    |
//! | `SYMPOSIUM_REQUEST_TIMEOUT_SECS`     | 120                         |
//! | `SYMPOSIUM_INVOCATION_TIMEOUT_SECS`  | 90                          |

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::debate::{DebateError, ParticipantRegistry};
use crate::error::ConfigError;

/// Iteration cap used by the original Socratic debate.
pub const DEFAULT_MAX_ITERATIONS: usize = 4;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Per-session debate rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateConfig {
    /// Hard upper bound on turns.
    pub max_iterations: usize,
    /// Participants whose utterances trigger a termination check. Empty
    /// means every utterance does.
    #[serde(default)]
    pub terminating_participants: Vec<String>,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            terminating_participants: Vec::new(),
        }
    }
}

impl DebateConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_terminator(mut self, name: impl Into<String>) -> Self {
        self.terminating_participants.push(name.into());
        self
    }

    /// Whether an utterance by `speaker` should be followed by a termination check.
    pub fn triggers_termination(&self, speaker: &str) -> bool {
        self.terminating_participants.is_empty()
            || self.terminating_participants.iter().any(|n| n == speaker)
    }

    pub fn validate(&self, registry: &ParticipantRegistry) -> Result<(), DebateError> {
        if self.max_iterations == 0 {
            return Err(DebateError::Configuration(
                "max_iterations must be greater than 0".to_string(),
            ));
        }
        if let Some(unknown) = self
            .terminating_participants
            .iter()
            .find(|n| !registry.contains(n))
        {
            return Err(DebateError::Configuration(format!(
                "terminating participant '{}' is not registered",
                unknown
            )));
        }
        Ok(())
    }
}

/// Endpoint settings for the completion and Assistants services.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Timeout for a single HTTP request.
    pub request_timeout: Duration,
    /// Upper bound on one participant invocation, polling included.
    pub invocation_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            model: String::new(),
            request_timeout: Duration::from_secs(120),
            invocation_timeout: Duration::from_secs(90),
        }
    }
}

impl ServiceConfig {
    /// Loads `.env` if present, then reads the `SYMPOSIUM_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "Ignoring unreadable .env file");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("SYMPOSIUM_API_BASE") {
            config.api_base = val;
        }

        config.api_key = lookup("SYMPOSIUM_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));

        config.model = lookup("SYMPOSIUM_MODEL")
            .ok_or_else(|| ConfigError::MissingEnvVar("SYMPOSIUM_MODEL".to_string()))?;

        if let Some(val) = lookup("SYMPOSIUM_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "SYMPOSIUM_REQUEST_TIMEOUT_SECS")?;
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(val) = lookup("SYMPOSIUM_INVOCATION_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "SYMPOSIUM_INVOCATION_TIMEOUT_SECS")?;
            config.invocation_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "api_base cannot be empty".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model cannot be empty".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "request_timeout must be greater than 0".to_string(),
            ));
        }
        if self.invocation_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "invocation_timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}
