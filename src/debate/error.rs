//! Error types for the debate core.
//!
//! [`DebateError`] is the taxonomy of everything that can end a session with
//! a `Failed` outcome. [`TerminationPolicyError`] is deliberately not part of
//! it: a failing termination check is logged and the iteration cap takes over.

use std::time::Duration;

use thiserror::Error;

use crate::error::{BackendError, LlmError};
use crate::resources::ResourceKind;

/// Errors that end a debate session.
#[derive(Debug, Error)]
pub enum DebateError {
    /// A required setting or participant is missing or invalid.
    #[error("Debate configuration error: {0}")]
    Configuration(String),

    /// A provisioning step failed. Earlier steps have been released.
    #[error("Resource provisioning failed at step {step} ({kind}): {source}")]
    ResourceProvisioning {
        step: usize,
        kind: ResourceKind,
        #[source]
        source: BackendError,
    },

    /// The selection strategy could not name a registered participant.
    #[error("Speaker selection failed: {0}")]
    Selection(#[from] SelectionError),

    /// A participant's capability call failed or timed out.
    #[error("Participant '{participant}' failed to respond: {source}")]
    AgentInvocation {
        participant: String,
        #[source]
        source: AgentInvocationError,
    },

    /// The history rejected an append.
    #[error("History error: {0}")]
    History(#[from] HistoryError),
}

impl DebateError {
    /// Short machine-readable label, used for metrics and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::ResourceProvisioning { .. } => "resource_provisioning",
            Self::Selection(_) => "selection",
            Self::AgentInvocation { .. } => "agent_invocation",
            Self::History(_) => "history",
        }
    }
}

/// Errors from a selection strategy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// The strategy had no rule for the current history.
    #[error("no speaker could be decided: {0}")]
    NoDecision(String),

    /// The strategy named someone outside the participant registry.
    #[error("'{0}' is not a registered participant")]
    UnknownParticipant(String),

    /// The model backing the strategy failed.
    #[error("selection model failed: {0}")]
    Model(String),
}

/// Errors from a participant's capability.
#[derive(Debug, Error)]
pub enum AgentInvocationError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("invocation timed out after {limit:?}")]
    Timeout { limit: Duration },

    #[error("required session resource '{0}' is not available")]
    MissingResource(&'static str),

    #[error("capability returned an empty reply")]
    EmptyResponse,

    #[error("{0}")]
    Other(String),
}

/// Errors from evaluating a termination strategy (distinct from answering "no").
#[derive(Debug, Error)]
pub enum TerminationPolicyError {
    #[error("termination model failed: {0}")]
    Model(#[from] LlmError),

    #[error("termination prompt could not be rendered: {0}")]
    Template(String),

    #[error("{0}")]
    Other(String),
}

/// Errors from appending to a [`super::History`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("utterance sequence {actual} does not match next sequence {expected}")]
    OutOfSequence { expected: usize, actual: usize },
}

/// Result type alias for debate operations.
pub type DebateResult<T> = Result<T, DebateError>;
