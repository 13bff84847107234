//! Error types shared across symposium subsystems.
//!
//! Defines the error enums for the collaborators the debate core talks to:
//! - LLM completion API interactions
//! - External resource backends (document ingestion, indexes, threads)
//! - Configuration loading and validation

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

/// Errors raised by external resource backends.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Failed to parse backend response: {0}")]
    ParseError(String),

    #[error("Resource '{0}' not found")]
    NotFound(String),

    #[error("Run '{run_id}' ended with status '{status}'")]
    RunFailed { run_id: String, status: String },

    #[error("Timed out after {limit:?} waiting for {operation}")]
    Timeout { operation: String, limit: Duration },
}

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// Persona or config file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Persona or config file is not valid YAML for the expected schema.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LlmError::ApiError {
            code: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "API error (500): boom");

        let err = BackendError::RunFailed {
            run_id: "run_1".to_string(),
            status: "expired".to_string(),
        };
        assert!(err.to_string().contains("expired"));

        let err = BackendError::Timeout {
            operation: "index vs_1".to_string(),
            limit: Duration::from_millis(1500),
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 1.5s waiting for index vs_1"
        );

        let err = ConfigError::MissingEnvVar("SYMPOSIUM_MODEL".to_string());
        assert!(err.to_string().contains("SYMPOSIUM_MODEL"));
    }
}
