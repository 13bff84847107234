//! YAML persona templates.
//!
//! A persona names a participant and carries the instructions its capability
//! is configured with:
//!
//! ```yaml
//! name: Socrates
//! role: Moderator
//! description: Questions every claim.
//! temperature: 0.7      # optional
//! max_tokens: 400       # optional
//! retrieval: false      # optional; true makes the persona resource-bound
//! instructions: |
//!   You are Socrates...
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const SOCRATES_YAML: &str = include_str!("../../personas/socrates.yaml");
const PLATO_YAML: &str = include_str!("../../personas/plato.yaml");
const ARISTOTLE_YAML: &str = include_str!("../../personas/aristotle.yaml");

/// A participant persona loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaTemplate {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub description: String,
    pub instructions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Answers from a document index rather than from the transcript alone.
    #[serde(default)]
    pub retrieval: bool,
}

impl PersonaTemplate {
    /// Parses and validates a persona.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let persona: Self = serde_yaml::from_str(yaml)?;
        persona.validate()?;
        Ok(persona)
    }

    /// Loads a persona file from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content).map_err(|e| match e {
            ConfigError::Yaml(inner) => ConfigError::InvalidValue {
                key: path.display().to_string(),
                message: inner.to_string(),
            },
            other => other,
        })
    }

    /// The three personas shipped with the binary: Socrates, Plato and
    /// Aristotle, in that order. Plato is retrieval-backed.
    pub fn builtin() -> Result<Vec<Self>, ConfigError> {
        [SOCRATES_YAML, PLATO_YAML, ARISTOTLE_YAML]
            .into_iter()
            .map(Self::from_yaml_str)
            .collect()
    }

    /// Looks up a built-in persona by name, ignoring case.
    pub fn builtin_named(name: &str) -> Result<Option<Self>, ConfigError> {
        Ok(Self::builtin()?
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "persona name cannot be empty".to_string(),
            ));
        }
        if self.instructions.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(format!(
                "persona '{}' has no instructions",
                self.name
            )));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationFailed(format!(
                    "persona '{}' temperature {} is outside 0.0..=2.0",
                    self.name, t
                )));
            }
        }
        Ok(())
    }
}
